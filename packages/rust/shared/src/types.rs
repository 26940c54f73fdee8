//! Errand wire types exchanged over the broker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MuninnError, Result};

// ---------------------------------------------------------------------------
// Errand
// ---------------------------------------------------------------------------

/// One unit of requested work delivered over the inbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Errand {
    /// Opaque token used for correlation and logging.
    pub errand_identifier: String,
    /// What kind of work to perform.
    pub instructions: Instructions,
    /// Requester fields we do not interpret; echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Errand {
    /// Decode an errand from a raw message body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| MuninnError::Decode(e.to_string()))
    }

    /// Borrow the discovery payload, or fail if the errand carries anything else.
    pub fn discovery(&self) -> Result<&DiscoveryInstructions> {
        match &self.instructions {
            Instructions::Discovery(discovery) => Ok(discovery),
            Instructions::Unsupported => Err(MuninnError::UnsupportedInstructions {
                errand_identifier: self.errand_identifier.clone(),
            }),
        }
    }
}

/// Tagged errand payload, dispatched on `instructions_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instructions_type", rename_all = "snake_case")]
pub enum Instructions {
    /// Gather supporting and opposing evidence for a claim.
    Discovery(DiscoveryInstructions),
    /// Any instruction kind this worker does not handle.
    #[serde(other)]
    Unsupported,
}

/// The claim to investigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInstructions {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// One synopsis per search query: supporting queries first, then opposing.
///
/// Empty strings mark queries for which no usable evidence was retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    pub discovery_result: Vec<String>,
}

/// Reply envelope pairing the original errand with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub errand: Errand,
    pub reply: DiscoveryReply,
}

impl Echo {
    /// Serialize for publishing on the reply queue.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MuninnError::validation(format!("echo: {e}")))
    }
}
