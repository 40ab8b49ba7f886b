//! Scriptable in-memory audio hardware for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::config::I2sPins;
use crate::models::error::RecorderError;
use crate::traits::audio_device::{AudioDevice, AudioHardware, DeviceRole};

/// One scripted microphone read.
#[derive(Debug, Clone)]
pub(crate) enum FakeRead {
    Data(Vec<u8>),
    Timeout,
    Fail,
}

#[derive(Debug, Default)]
pub(crate) struct FakeLog {
    pub open_roles: HashSet<DeviceRole>,
    pub opens: Vec<(DeviceRole, AudioFormat)>,
    pub enables: Vec<DeviceRole>,
    pub disables: Vec<DeviceRole>,
    pub sample_rates: Vec<u32>,
    pub written: Vec<u8>,
    pub write_calls: usize,
}

#[derive(Default)]
pub(crate) struct FakeHardware {
    pub log: Arc<Mutex<FakeLog>>,
    script: Arc<Mutex<VecDeque<FakeRead>>>,
    fail_open: Mutex<Option<DeviceRole>>,
    fail_write_after: Mutex<Option<usize>>,
}

impl FakeHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reads(&self, reads: impl IntoIterator<Item = FakeRead>) {
        self.script.lock().extend(reads);
    }

    pub fn fail_open(&self, role: DeviceRole) {
        *self.fail_open.lock() = Some(role);
    }

    /// Make render writes fail once `calls` writes have succeeded.
    pub fn fail_write_after(&self, calls: usize) {
        *self.fail_write_after.lock() = Some(calls);
    }

    pub fn script_is_empty(&self) -> bool {
        self.script.lock().is_empty()
    }
}

impl AudioHardware for FakeHardware {
    type Device = FakeDevice;

    fn open(&self, role: DeviceRole, format: AudioFormat, _pins: &I2sPins) -> Result<FakeDevice, RecorderError> {
        if *self.fail_open.lock() == Some(role) {
            return Err(RecorderError::HardwareInitFailure("scripted open failure".into()));
        }
        let mut log = self.log.lock();
        if !log.open_roles.insert(role) {
            return Err(RecorderError::HardwareInitFailure(format!("{:?} channel busy", role)));
        }
        log.opens.push((role, format));
        Ok(FakeDevice {
            role,
            format,
            enabled: false,
            log: Arc::clone(&self.log),
            script: Arc::clone(&self.script),
            fail_write_after: *self.fail_write_after.lock(),
        })
    }
}

pub(crate) struct FakeDevice {
    role: DeviceRole,
    format: AudioFormat,
    enabled: bool,
    log: Arc<Mutex<FakeLog>>,
    script: Arc<Mutex<VecDeque<FakeRead>>>,
    fail_write_after: Option<usize>,
}

impl AudioDevice for FakeDevice {
    fn role(&self) -> DeviceRole {
        self.role
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable(&mut self) -> Result<(), RecorderError> {
        self.enabled = true;
        self.log.lock().enables.push(self.role);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), RecorderError> {
        self.enabled = false;
        self.log.lock().disables.push(self.role);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RecorderError> {
        let next = self.script.lock().pop_front();
        match next {
            Some(FakeRead::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.script.lock().push_front(FakeRead::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(FakeRead::Fail) => Err(RecorderError::DeviceFailure("scripted read failure".into())),
            Some(FakeRead::Timeout) | None => {
                thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(0)
            }
        }
    }

    fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize, RecorderError> {
        let mut log = self.log.lock();
        if let Some(limit) = self.fail_write_after {
            if log.write_calls >= limit {
                return Err(RecorderError::DeviceFailure("scripted write failure".into()));
            }
        }
        log.write_calls += 1;
        log.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        self.format.sample_rate = sample_rate;
        self.log.lock().sample_rates.push(sample_rate);
        Ok(())
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.log.lock().open_roles.remove(&self.role);
    }
}

/// `count` raw capture words all holding `word`.
pub(crate) fn raw_words(word: i32, count: usize) -> Vec<u8> {
    (0..count).flat_map(|_| word.to_le_bytes()).collect()
}
