// ============================================================
// Layer 5 — Ratio Network
// ============================================================
// One hidden layer, sigmoid output:
//
//   inputs [batch, INPUT_DIM]
//     → Linear(INPUT_DIM → hidden) → ReLU
//     → Linear(hidden → 1)         → sigmoid
//   ratio  [batch, 1]              in (0, 1)
//
// The hidden layer can grow in place. New hidden units start with
// random incoming weights and zero outgoing weights, so a grown
// network computes exactly what it computed before growing.

use burn::{
    module::Param,
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{
        activation::{relu, sigmoid},
        Distribution,
    },
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct RatioNetConfig {
    pub input_dim:   usize,
    pub hidden_size: usize,
}

impl RatioNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RatioNet<B> {
        RatioNet {
            hidden: LinearConfig::new(self.input_dim, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, 1).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct RatioNet<B: Backend> {
    pub hidden: Linear<B>,
    pub output: Linear<B>,
}

impl<B: Backend> RatioNet<B> {
    /// inputs: [batch, input_dim] → ratios: [batch, 1]
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = relu(self.hidden.forward(inputs));
        sigmoid(self.output.forward(h))
    }

    pub fn input_dim(&self) -> usize {
        self.hidden.weight.val().dims()[0]
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden.weight.val().dims()[1]
    }

    /// Add `extra` hidden units without changing the network's output.
    ///
    /// All parameters are replaced by new ones (fresh ids), so any
    /// optimizer state keyed on the old parameters no longer applies.
    pub fn grow(self, extra: usize) -> Self {
        if extra == 0 {
            return self;
        }
        let device = self.hidden.weight.device();
        let [input_dim, hidden_size] = self.hidden.weight.val().dims();
        let std = 1.0 / (input_dim as f64).sqrt();

        // Incoming weights [input_dim, hidden] ++ random [input_dim, extra]
        let new_in = Tensor::<B, 2>::random([input_dim, extra], Distribution::Normal(0.0, std), &device);
        let hidden_w = Tensor::cat(vec![untracked(&self.hidden.weight), new_in], 1);

        let hidden_b = self.hidden.bias.as_ref().map(|b| {
            Tensor::cat(vec![untracked(b), Tensor::<B, 1>::zeros([extra], &device)], 0)
        });

        // Outgoing weights [hidden, 1] ++ zeros [extra, 1]
        let output_w = Tensor::cat(
            vec![untracked(&self.output.weight), Tensor::<B, 2>::zeros([extra, 1], &device)],
            0,
        );

        let mut hidden = LinearConfig::new(input_dim, hidden_size + extra).init(&device);
        hidden.weight = Param::from_tensor(hidden_w);
        hidden.bias   = hidden_b.map(Param::from_tensor);

        let mut output = LinearConfig::new(hidden_size + extra, 1).init(&device);
        output.weight = Param::from_tensor(output_w);
        output.bias   = self.output.bias.as_ref().map(|b| Param::from_tensor(untracked(b)));

        Self { hidden, output }
    }
}

/// Parameter value cut loose from the autodiff graph. `detach()` keeps the
/// require-grad flag, which would make the concatenated tensor a non-leaf.
fn untracked<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> Tensor<B, D> {
    param.val().set_require_grad(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn probe(device: &<B as Backend>::Device) -> Tensor<B, 2> {
        Tensor::random([6, 5], Distribution::Uniform(-1.0, 1.0), device)
    }

    #[test]
    fn test_output_shape_and_range() {
        let device = Default::default();
        let net: RatioNet<B> = RatioNetConfig::new(5, 4).init(&device);
        let out = net.forward(probe(&device));
        assert_eq!(out.dims(), [6, 1]);
        let values: Vec<f32> = out.into_data().iter::<f32>().collect();
        assert!(values.iter().all(|v| *v > 0.0 && *v < 1.0));
    }

    #[test]
    fn test_grow_preserves_outputs() {
        let device = Default::default();
        let net: RatioNet<B> = RatioNetConfig::new(5, 4).init(&device);
        let x = probe(&device);
        let before: Vec<f32> = net.forward(x.clone()).into_data().iter::<f32>().collect();

        let grown = net.grow(3);
        assert_eq!(grown.hidden_size(), 7);
        assert_eq!(grown.input_dim(), 5);
        let after: Vec<f32> = grown.forward(x).into_data().iter::<f32>().collect();

        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn test_grow_twice_on_autodiff_with_a_step_between() {
        use burn::{
            backend::Autodiff,
            nn::loss::{MseLoss, Reduction},
            optim::{GradientsParams, Optimizer, SgdConfig},
        };
        type AB = Autodiff<NdArray>;

        let device = Default::default();
        let x = Tensor::<AB, 2>::random([6, 5], Distribution::Uniform(-1.0, 1.0), &device);
        let y = Tensor::<AB, 2>::full([6, 1], 0.3, &device);

        let net: RatioNet<AB> = RatioNetConfig::new(5, 4).init(&device);
        let net = net.grow(2);

        let mut optim = SgdConfig::new().init::<AB, RatioNet<AB>>();
        let loss = MseLoss::new().forward(net.forward(x.clone()), y, Reduction::Mean);
        let grads = GradientsParams::from_grads(loss.backward(), &net);
        let net = optim.step(0.1, net, grads);

        let before: Vec<f32> = net.forward(x.clone()).into_data().iter::<f32>().collect();
        let grown = net.grow(3);
        assert_eq!(grown.hidden_size(), 9);
        let after: Vec<f32> = grown.forward(x).into_data().iter::<f32>().collect();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn test_grow_by_zero_is_identity() {
        let device = Default::default();
        let net: RatioNet<B> = RatioNetConfig::new(3, 2).init(&device);
        assert_eq!(net.grow(0).hidden_size(), 2);
    }
}
