//! BLIP VQA bridge
//! Connects to a persistent Python daemon that hosts the pretrained model

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::processor::ModelInputs;

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Request to the VQA daemon
#[derive(Debug, Default, Serialize)]
pub struct DaemonRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_values_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_ids: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_mask: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<usize>,
}

impl DaemonRequest {
    fn command(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    fn generate(inputs: &ModelInputs, max_new_tokens: usize) -> Self {
        Self {
            command: "generate".to_string(),
            pixel_values_base64: Some(encode_f32_le(&inputs.pixel_values)),
            image_height: Some(inputs.image_height),
            image_width: Some(inputs.image_width),
            input_ids: Some(inputs.input_ids.clone()),
            attention_mask: Some(inputs.attention_mask.clone()),
            max_new_tokens: Some(max_new_tokens),
        }
    }
}

/// Response from the VQA daemon
#[derive(Debug, Deserialize, Clone)]
pub struct DaemonResponse {
    pub token_ids: Option<Vec<u32>>,
    pub error: Option<String>,
    pub status: Option<String>,
    pub device: Option<String>,
}

/// Client and supervisor of the BLIP daemon process
pub struct BlipBridge {
    config: BridgeConfig,
    model_dir: PathBuf,
    daemon_process: Mutex<Option<Child>>,
}

impl BlipBridge {
    pub fn new(config: BridgeConfig, model_dir: &Path) -> Self {
        Self {
            config,
            model_dir: model_dir.to_path_buf(),
            daemon_process: Mutex::new(None),
        }
    }

    fn is_daemon_running(&self) -> bool {
        self.config.socket_path.exists() && self.connect_to_daemon().is_ok()
    }

    /// Start the daemon unless one already answers on the socket, then wait
    /// until the model is loaded.
    pub fn ensure_daemon_running(&self) -> Result<()> {
        if self.is_daemon_running() {
            debug!("VQA daemon already running");
            return Ok(());
        }

        info!(
            "Starting VQA daemon {:?} for model {:?}",
            self.config.script_path, self.model_dir
        );

        let child = Command::new(&self.config.python_cmd)
            .arg(&self.config.script_path)
            .arg("--socket")
            .arg(&self.config.socket_path)
            .arg("--model-dir")
            .arg(&self.model_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::InferenceError(format!("Failed to start VQA daemon: {}", e)))?;

        *self.lock_process() = Some(child);

        let deadline = Instant::now() + Duration::from_secs(self.config.startup_timeout_secs);
        while Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);

            if let Some(status) = self.exited_status() {
                return Err(Error::InferenceError(format!(
                    "VQA daemon exited during startup ({})",
                    status
                )));
            }

            if let Ok(mut stream) = self.connect_to_daemon() {
                if self
                    .send_request(&mut stream, &DaemonRequest::command("check"))
                    .is_ok()
                {
                    info!("VQA daemon ready");
                    return Ok(());
                }
            }
        }

        self.kill_daemon_process();
        Err(Error::InferenceError(format!(
            "VQA daemon failed to start within {} seconds",
            self.config.startup_timeout_secs
        )))
    }

    /// Ask the daemon to exit, killing it if it lingers
    pub fn stop_daemon(&self) -> Result<()> {
        if self.is_daemon_running() {
            info!("Stopping VQA daemon");
            if let Ok(mut stream) = self.connect_to_daemon() {
                let _ = self.send_request(&mut stream, &DaemonRequest::command("shutdown"));
            }
        }

        let mut guard = self.lock_process();
        if let Some(mut child) = guard.take() {
            for _ in 0..20 {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return Ok(());
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            warn!("VQA daemon did not exit, killing it");
            let _ = child.kill();
            let _ = child.wait();
        }

        Ok(())
    }

    fn kill_daemon_process(&self) {
        if let Some(mut child) = self.lock_process().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    pub fn status(&self) -> Result<DaemonResponse> {
        self.call_daemon(&DaemonRequest::command("status"))
    }

    /// Run one generate pass and return the produced token ids
    pub fn generate(&self, inputs: &ModelInputs, max_new_tokens: usize) -> Result<Vec<u32>> {
        let response = self.call_daemon(&DaemonRequest::generate(inputs, max_new_tokens))?;
        response.token_ids.ok_or_else(|| {
            Error::InferenceError("Daemon response carried no token_ids".to_string())
        })
    }

    fn lock_process(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        // The guarded Option<Child> stays consistent even if a holder panicked
        self.daemon_process
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn exited_status(&self) -> Option<std::process::ExitStatus> {
        let mut guard = self.lock_process();
        match guard.as_mut().map(|child| child.try_wait()) {
            Some(Ok(Some(status))) => {
                guard.take();
                Some(status)
            }
            _ => None,
        }
    }

    fn connect_to_daemon(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.config.socket_path)
            .map_err(|e| Error::InferenceError(format!("Failed to connect to VQA daemon: {}", e)))
    }

    /// Send a length-prefixed JSON frame and read the reply frame
    fn send_request(
        &self,
        stream: &mut UnixStream,
        request: &DaemonRequest,
    ) -> Result<DaemonResponse> {
        stream
            .set_read_timeout(Some(Duration::from_secs(self.config.request_timeout_secs)))
            .ok();
        stream.set_write_timeout(Some(WRITE_TIMEOUT)).ok();

        let request_json = serde_json::to_vec(request)
            .map_err(|e| Error::InferenceError(format!("Failed to serialize request: {}", e)))?;
        write_frame(stream, &request_json)?;

        let response_buf = read_frame(stream)?;
        let response: DaemonResponse = serde_json::from_slice(&response_buf)
            .map_err(|e| Error::InferenceError(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = &response.error {
            return Err(Error::InferenceError(error.clone()));
        }

        Ok(response)
    }

    fn call_daemon(&self, request: &DaemonRequest) -> Result<DaemonResponse> {
        let mut stream = self.connect_to_daemon()?;
        self.send_request(&mut stream, request)
    }
}

impl Drop for BlipBridge {
    fn drop(&mut self) {
        // Only a daemon this bridge spawned is killed
        self.kill_daemon_process();
    }
}

fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<()> {
    let length = (payload.len() as u32).to_be_bytes();
    stream
        .write_all(&length)
        .map_err(|e| Error::InferenceError(format!("Failed to write length: {}", e)))?;
    stream
        .write_all(payload)
        .map_err(|e| Error::InferenceError(format!("Failed to write request: {}", e)))?;
    Ok(())
}

fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut length_buf = [0u8; 4];
    stream
        .read_exact(&mut length_buf)
        .map_err(|e| Error::InferenceError(format!("Failed to read response length: {}", e)))?;
    let response_length = u32::from_be_bytes(length_buf) as usize;

    let mut response_buf = vec![0u8; response_length];
    stream
        .read_exact(&mut response_buf)
        .map_err(|e| Error::InferenceError(format!("Failed to read response: {}", e)))?;
    Ok(response_buf)
}

fn encode_f32_le(values: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
