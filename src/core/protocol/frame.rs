// src/core/protocol/frame.rs

//! Framing and payload encoding for the RPC transport.
//!
//! Every message is a length-prefixed frame whose body is a `bincode`
//! (standard configuration) encoding of an `RpcRequest` or `RpcResponse`.

use crate::core::MasterError;
use bincode::config;
use tokio_util::codec::LengthDelimitedCodec;

/// Upper bound for a single frame; a registration or master list is far smaller.
pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Builds the codec used on both ends of an RPC connection.
pub fn rpc_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

pub fn encode<T: bincode::Encode>(msg: &T) -> Result<Vec<u8>, MasterError> {
    Ok(bincode::encode_to_vec(msg, config::standard())?)
}

pub fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, MasterError> {
    let (msg, _) = bincode::decode_from_slice::<T, _>(bytes, config::standard())?;
    Ok(msg)
}
