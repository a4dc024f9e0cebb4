//! Single error surface for round processing and the league engine.

use thiserror::Error;

use tg_io::{hasher::HashError, intent_store::StoreError, IoError};

use crate::batch::AssignError;
use crate::swap_saga::SagaError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Domain precondition failed; retrying the same input will not help.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown round {round_id} in guild {guild_id}")]
    UnknownRound { guild_id: String, round_id: String },

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl PipelineError {
    /// True for caller mistakes, false for technical or collaborator failures.
    pub fn is_validation(&self) -> bool {
        match self {
            PipelineError::Validation(_) | PipelineError::UnknownRound { .. } => true,
            PipelineError::Saga(SagaError::Validation(_)) => true,
            PipelineError::Assign(e) => e.is_rejection(),
            _ => false,
        }
    }
}
