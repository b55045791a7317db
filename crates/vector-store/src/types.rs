use orca_protocol::Chunk;
use serde::{Deserialize, Serialize};

/// A candidate returned by a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub payload: Chunk,
    pub score: f32,
}
