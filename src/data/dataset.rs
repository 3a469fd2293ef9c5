// ============================================================
// Layer 4 — Fixed Sample Sets
// ============================================================
// A finite, owned list of samples behind Burn's Dataset trait.
// Used for held-out probe sets: drawn once from the generator and
// then replayed unchanged, so evaluations before and after a model
// change (growth, checkpoint reload) are comparable.

use burn::data::dataset::Dataset;

use crate::data::generator::SampleGenerator;
use crate::domain::{sample::CompressionSample, traits::ImageCorpus};

pub struct ProbeSet {
    samples: Vec<CompressionSample>,
}

impl ProbeSet {
    pub fn new(samples: Vec<CompressionSample>) -> Self {
        Self { samples }
    }

    /// Draw up to `count` samples; failed slots are skipped.
    pub fn draw<C: ImageCorpus, R: rand::Rng>(
        generator: &mut SampleGenerator<C, R>,
        count:     usize,
    ) -> Self {
        Self::new(generator.next_batch(count).samples)
    }

    pub fn samples(&self) -> &[CompressionSample] {
        &self.samples
    }
}

impl Dataset<CompressionSample> for ProbeSet {
    fn get(&self, index: usize) -> Option<CompressionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{generator::SamplerConfig, test_support::checker_corpus};
    use crate::domain::format::ImageFormat;

    #[test]
    fn test_probe_set_replays_the_same_samples() {
        let cfg = SamplerConfig {
            formats:       vec![ImageFormat::Jpeg],
            quality_range: (30, 60),
            width_range:   (10, 30),
        };
        let mut gen = SampleGenerator::seeded(checker_corpus(2, 32, 32), cfg, 9).unwrap();
        let probe = ProbeSet::draw(&mut gen, 6);
        assert_eq!(probe.len(), 6);
        assert_eq!(probe.get(2).as_ref(), probe.samples().get(2));
        assert!(probe.get(6).is_none());
    }
}
