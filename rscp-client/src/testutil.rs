//! Scripted appliance emulator for session tests.

use std::time::Duration;

use rscp_protocol::{tags, DataBlock, Frame, ResultCode, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::cipher::{CipherSession, BLOCK_SIZE};
use crate::config::ClientConfig;

pub(crate) const KEY: &str = "moon!";
pub(crate) const USER: &str = "portal@example.com";
pub(crate) const PASSWORD: &str = "hunter2";

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new("emulated", USER, PASSWORD, KEY)
        .with_read_timeout(Duration::from_secs(2))
        .with_acquire_timeout(Duration::from_millis(200))
}

/// Runs a scripted appliance on the far end of a duplex pipe: decrypts
/// request frames with its own cipher session and answers a small fixed
/// tag catalog. Exits on EOF.
pub(crate) fn spawn_appliance(pipe: DuplexStream) -> JoinHandle<()> {
    spawn_scripted(pipe, usize::MAX, true)
}

/// Appliance that hangs up after answering `max_responses` frames.
pub(crate) fn spawn_appliance_limited(
    pipe: DuplexStream,
    max_responses: usize,
) -> JoinHandle<()> {
    spawn_scripted(pipe, max_responses, true)
}

/// Appliance that answers `max_responses` frames, then keeps the pipe
/// open and swallows everything else without replying.
pub(crate) fn spawn_appliance_mute(pipe: DuplexStream, max_responses: usize) -> JoinHandle<()> {
    spawn_scripted(pipe, max_responses, false)
}

fn spawn_scripted(mut pipe: DuplexStream, max_responses: usize, hang_up: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cipher = CipherSession::new(KEY).unwrap();
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = vec![0u8; 4096];
        let mut answered = 0usize;
        loop {
            while !pending.is_empty() && pending.len() % BLOCK_SIZE == 0 {
                if answered >= max_responses {
                    // Mute mode: the request bytes are discarded unread.
                    pending.clear();
                    break;
                }
                let preview = cipher.preview_decrypt(&pending).unwrap();
                if Frame::complete_len(&preview).is_none() {
                    break;
                }
                let plain = cipher.decrypt(&std::mem::take(&mut pending)).unwrap();
                let request = Frame::decode(&plain).unwrap();
                let response = respond(&request);
                let ct = cipher.encrypt(&response.encode().unwrap());
                if pipe.write_all(&ct).await.is_err() {
                    return;
                }
                answered += 1;
                if answered >= max_responses && hang_up {
                    return;
                }
            }
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
            }
        }
    })
}

fn respond(request: &Frame) -> Frame {
    let mut blocks = Vec::new();
    for block in request.blocks() {
        blocks.push(answer(block).expect("emulator answer"));
    }
    Frame::new(blocks)
}

fn answer(block: &DataBlock) -> Result<DataBlock, rscp_protocol::ProtocolError> {
    if block.tag() == tags::RSCP_REQ_AUTHENTICATION {
        let children = block.children()?;
        let user = children
            .iter()
            .find(|b| b.tag() == tags::RSCP_AUTHENTICATION_USER)
            .and_then(|b| b.as_string());
        let password = children
            .iter()
            .find(|b| b.tag() == tags::RSCP_AUTHENTICATION_PASSWORD)
            .and_then(|b| b.as_string());
        let level = if user.as_deref() == Some(USER) && password.as_deref() == Some(PASSWORD) {
            10
        } else {
            0
        };
        return DataBlock::new(tags::RSCP_AUTHENTICATION, Value::UChar8(level));
    }
    if block.tag() == tags::INFO_REQ_MAC_ADDRESS {
        return DataBlock::new(
            tags::INFO_MAC_ADDRESS,
            Value::String("00:11:22:33:44:55".into()),
        );
    }
    if block.tag() == tags::EMS_REQ_BAT_SOC {
        return DataBlock::new(tags::EMS_BAT_SOC, Value::UChar8(73));
    }
    if block.tag() == tags::BAT_REQ_DATA {
        return DataBlock::new(
            tags::BAT_DATA,
            Value::Container(vec![
                DataBlock::new(tags::BAT_INDEX, Value::UInt16(0))?,
                DataBlock::new(tags::BAT_RSOC, Value::Float32(73.5))?,
                DataBlock::new(tags::BAT_DEVICE_NAME, Value::String("BAT_1".into()))?,
            ]),
        );
    }
    DataBlock::new(tags::RSCP_GENERAL_ERROR, Value::Error(ResultCode::UnknownTag))
}
