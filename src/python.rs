//! Python bindings for the soundboard.

use std::path::PathBuf;

use pyo3::exceptions::{PyKeyError, PyPermissionError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::audio_engine::audio_stream::setup_logger;
use crate::audio_engine::errors::CaptureError;
use crate::config::SoundboardConfig;
use crate::coordinator::{SlotCoordinator, SoundboardError};
use crate::messages::NotificationLevel;
use crate::store::StoreError;
use crate::store::kv::SledStore;

fn to_py_err(e: SoundboardError) -> PyErr {
    match &e {
        SoundboardError::Capture(CaptureError::PermissionDenied) => {
            PyPermissionError::new_err(e.to_string())
        }
        SoundboardError::Store(StoreError::NotFound(_)) => PyKeyError::new_err(e.to_string()),
        SoundboardError::EmptyName
        | SoundboardError::EmptySlot(_)
        | SoundboardError::SlotOutOfRange(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn unix_seconds(at: chrono::DateTime<chrono::Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// A soundboard backed by the default audio devices and a sled store.
#[pyclass(unsendable)]
pub struct Soundboard {
    inner: SlotCoordinator<SledStore>,
}

#[pymethods]
impl Soundboard {
    #[new]
    #[pyo3(signature = (config_path=None))]
    pub fn new(config_path: Option<PathBuf>) -> PyResult<Self> {
        setup_logger();

        let config = SoundboardConfig::load(config_path.as_deref())
            .map_err(|e| to_py_err(e.into()))?;
        let inner = SlotCoordinator::open(&config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Load stored sounds into the grid. Returns `(migrated, unmigrated)`.
    pub fn load(&mut self) -> PyResult<(Vec<(String, usize)>, Vec<String>)> {
        let report = self.inner.load().map_err(to_py_err)?;
        let migrated = report
            .migrated
            .into_iter()
            .map(|(id, slot)| (id, slot.get()))
            .collect();
        Ok((migrated, report.unmigrated))
    }

    /// Start recording into a slot. Returns the start time in Unix seconds.
    pub fn start_recording(&mut self, index: usize) -> PyResult<f64> {
        let started_at = self.inner.start_recording(index).map_err(to_py_err)?;
        Ok(unix_seconds(started_at))
    }

    /// Stop recording and save the sound. Returns the saved sound id.
    pub fn stop_recording(&mut self) -> PyResult<String> {
        let sound = self.inner.stop_recording().map_err(to_py_err)?;
        Ok(sound.id)
    }

    pub fn cancel_recording(&mut self) -> bool {
        self.inner.cancel_recording()
    }

    pub fn has_unsaved_recording(&self) -> bool {
        self.inner.has_unsaved_recording()
    }

    /// Stop all playback and delete every stored sound.
    pub fn clear_all(&mut self) -> PyResult<()> {
        self.inner.clear_all().map_err(to_py_err)
    }

    pub fn check_recording(&mut self) -> PyResult<()> {
        self.inner.check_recording().map_err(to_py_err)
    }

    pub fn recording_started_at(&self) -> Option<f64> {
        self.inner.recording_started_at().map(unix_seconds)
    }

    /// One of `granted`, `denied`, `prompt`.
    pub fn microphone_permission(&self) -> &'static str {
        self.inner.microphone_permission().as_str()
    }

    #[pyo3(signature = (index, looping=false))]
    pub fn play(&mut self, index: usize, looping: bool) -> PyResult<()> {
        self.inner.play(index, looping).map_err(to_py_err)
    }

    pub fn toggle(&mut self, index: usize) -> PyResult<bool> {
        self.inner.toggle(index).map_err(to_py_err)
    }

    #[pyo3(signature = (index=None))]
    pub fn stop(&mut self, index: Option<usize>) -> PyResult<()> {
        self.inner.stop_playback(index).map_err(to_py_err)
    }

    #[pyo3(signature = (index=None))]
    pub fn is_playing(&mut self, index: Option<usize>) -> bool {
        self.inner.is_playing(index)
    }

    pub fn rename(&mut self, index: usize, name: &str) -> PyResult<()> {
        self.inner.rename(index, name).map_err(to_py_err)
    }

    pub fn delete(&mut self, index: usize) -> PyResult<()> {
        self.inner.delete(index).map_err(to_py_err)
    }

    /// One entry per slot: `None` when empty, otherwise a dict describing the sound.
    pub fn slots(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let list = PyList::empty(py);
        for (_, sound) in self.inner.slots().iter() {
            match sound {
                Some(sound) => {
                    let dict = PyDict::new(py);
                    dict.set_item("id", &sound.id)?;
                    dict.set_item("name", &sound.name)?;
                    dict.set_item("created_at", sound.created_at.to_rfc3339())?;
                    dict.set_item("duration", sound.duration)?;
                    dict.set_item("mime_type", &sound.audio.mime_type)?;
                    list.append(dict)?;
                }
                None => list.append(py.None())?,
            }
        }
        Ok(list.into_any().unbind())
    }

    /// `(used, quota)` in bytes, or `None` when unavailable.
    pub fn storage_usage(&self) -> Option<(u64, u64)> {
        self.inner
            .storage_usage()
            .map(|estimate| (estimate.used, estimate.quota))
    }

    /// Poll for the next pending notification.
    ///
    /// Returns `None` when no notifications are available.
    pub fn poll_notification(&mut self, py: Python<'_>) -> PyResult<Option<Py<PyAny>>> {
        let Some(notification) = self.inner.poll_notification() else {
            return Ok(None);
        };

        let dict = PyDict::new(py);
        let level = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Error => "error",
        };
        dict.set_item("level", level)?;
        dict.set_item("msg", notification.message)?;

        Ok(Some(dict.into_any().unbind()))
    }
}
