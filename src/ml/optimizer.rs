// ============================================================
// Layer 5 — Optimizer Selection
// ============================================================
// The optimizer is chosen at construction time from a name
// (adam | sgd | rmsprop). Each Burn optimizer is a different
// concrete type, so the estimator holds it behind NetOptimizer,
// which also knows how to save and restore its own record.

use std::{fmt, str::FromStr};

use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::checkpoint::{CheckpointError, CheckpointStore};
use crate::ml::model::RatioNet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
    RmsProp,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown optimizer '{0}' (expected adam, sgd or rmsprop)")]
pub struct UnknownOptimizerError(pub String);

impl FromStr for OptimizerKind {
    type Err = UnknownOptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam"    => Ok(Self::Adam),
            "sgd"     => Ok(Self::Sgd),
            "rmsprop" => Ok(Self::RmsProp),
            _         => Err(UnknownOptimizerError(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adam    => "adam",
            Self::Sgd     => "sgd",
            Self::RmsProp => "rmsprop",
        })
    }
}

/// An optimizer bound to RatioNet on backend `B`.
pub trait NetOptimizer<B: AutodiffBackend> {
    fn step(&mut self, lr: f64, net: RatioNet<B>, grads: GradientsParams) -> RatioNet<B>;

    fn save(&self, store: &CheckpointStore, stem: &str) -> Result<(), CheckpointError>;

    /// Replace this optimizer's state with the one recorded under `stem`.
    fn load(
        self: Box<Self>,
        store:  &CheckpointStore,
        stem:   &str,
        device: &B::Device,
    ) -> Result<Box<dyn NetOptimizer<B>>, CheckpointError>;
}

impl<B, O> NetOptimizer<B> for O
where
    B: AutodiffBackend,
    O: Optimizer<RatioNet<B>, B> + 'static,
{
    fn step(&mut self, lr: f64, net: RatioNet<B>, grads: GradientsParams) -> RatioNet<B> {
        <O as Optimizer<RatioNet<B>, B>>::step(self, lr, net, grads)
    }

    fn save(&self, store: &CheckpointStore, stem: &str) -> Result<(), CheckpointError> {
        store.save_record::<B, _>(self.to_record(), stem).map(|_| ())
    }

    fn load(
        self: Box<Self>,
        store:  &CheckpointStore,
        stem:   &str,
        device: &B::Device,
    ) -> Result<Box<dyn NetOptimizer<B>>, CheckpointError> {
        let record = store.load_record::<B, <O as Optimizer<RatioNet<B>, B>>::Record>(stem, device)?;
        Ok(Box::new((*self).load_record(record)))
    }
}

/// Fresh optimizer of the given kind, with Burn's default settings.
pub fn build<B: AutodiffBackend>(kind: OptimizerKind) -> Box<dyn NetOptimizer<B>> {
    match kind {
        OptimizerKind::Adam    => Box::new(AdamConfig::new().with_epsilon(1e-8).init::<B, RatioNet<B>>()),
        OptimizerKind::Sgd     => Box::new(SgdConfig::new().init::<B, RatioNet<B>>()),
        OptimizerKind::RmsProp => Box::new(RmsPropConfig::new().init::<B, RatioNet<B>>()),
    }
}
