use anyhow::{anyhow, Context, Result};
use libloading::Library;
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::ffi::CString;
use std::os::raw::{c_char, c_double, c_int};
use crate::config::BoardConfig;
use crate::drivers::{RawWindow, SampleSource, SourceError};
const PRESET_DEFAULT: c_int = 0;
const STREAM_RINGBUF_PACKETS: c_int = 450_000;
#[cfg(target_os = "windows")]
const BOARD_CONTROLLER_LIB: &str = "BoardController.dll";
#[cfg(target_os = "macos")]
const BOARD_CONTROLLER_LIB: &str = "libBoardController.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const BOARD_CONTROLLER_LIB: &str = "libBoardController.so";
#[derive(Serialize)]
struct BrainFlowInputParams {
    serial_port: String,
    mac_address: String,
    ip_address: String,
    ip_address_aux: String,
    ip_address_anc: String,
    ip_port: i32,
    ip_port_aux: i32,
    ip_port_anc: i32,
    ip_protocol: i32,
    other_info: String,
    timeout: i32,
    serial_number: String,
    file: String,
    file_aux: String,
    file_anc: String,
    master_board: i32,
}
impl BrainFlowInputParams {
    fn for_serial(port: &str) -> Self {
        Self {
            serial_port: port.to_string(),
            mac_address: String::new(),
            ip_address: String::new(),
            ip_address_aux: String::new(),
            ip_address_anc: String::new(),
            ip_port: 0,
            ip_port_aux: 0,
            ip_port_anc: 0,
            ip_protocol: 0,
            other_info: String::new(),
            timeout: 0,
            serial_number: String::new(),
            file: String::new(),
            file_aux: String::new(),
            file_anc: String::new(),
            master_board: -100, // NO_BOARD
        }
    }
}
struct BrainFlowApi {
    #[allow(dead_code)]
    lib: Library,
    prepare_session: unsafe extern "C" fn(c_int, *const c_char) -> c_int,
    start_stream: unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char) -> c_int,
    stop_stream: unsafe extern "C" fn(c_int, *const c_char) -> c_int,
    release_session: unsafe extern "C" fn(c_int, *const c_char) -> c_int,
    get_sampling_rate: unsafe extern "C" fn(c_int, c_int, *mut c_int) -> c_int,
    get_num_rows: unsafe extern "C" fn(c_int, c_int, *mut c_int) -> c_int,
    get_eeg_channels: unsafe extern "C" fn(c_int, c_int, *mut c_int, *mut c_int) -> c_int,
    get_current_board_data: unsafe extern "C" fn(
        c_int,
        c_int,
        *mut c_double,
        *mut c_int,
        c_int,
        *const c_char,
    ) -> c_int,
}
impl BrainFlowApi {
    fn load() -> Result<Self> {
        // The BrainFlow board controller must sit next to the executable or on the loader path.
        let lib = unsafe { Library::new(BOARD_CONTROLLER_LIB) }
            .with_context(|| format!("{BOARD_CONTROLLER_LIB} not found"))?;
        // Safety: signatures follow the BrainFlow C API of the official package.
        unsafe {
            Ok(Self {
                prepare_session: *lib.get(b"prepare_session\0")?,
                start_stream: *lib.get(b"start_stream\0")?,
                stop_stream: *lib.get(b"stop_stream\0")?,
                release_session: *lib.get(b"release_session\0")?,
                get_sampling_rate: *lib.get(b"get_sampling_rate\0")?,
                get_num_rows: *lib.get(b"get_num_rows\0")?,
                get_eeg_channels: *lib.get(b"get_eeg_channels\0")?,
                get_current_board_data: *lib.get(b"get_current_board_data\0")?,
                lib,
            })
        }
    }
    fn instance() -> Result<&'static BrainFlowApi> {
        static API: OnceCell<BrainFlowApi> = OnceCell::new();
        API.get_or_try_init(Self::load)
    }
    fn check(code: c_int, ctx: &str) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(anyhow!("{ctx} failed (BrainFlow code {code})"))
        }
    }
    fn prepare(&self, board_id: c_int, input: &CString) -> Result<()> {
        Self::check(
            unsafe { (self.prepare_session)(board_id, input.as_ptr()) },
            "prepare_session",
        )
    }
    fn start_stream(&self, board_id: c_int, input: &CString) -> Result<()> {
        Self::check(
            unsafe {
                (self.start_stream)(
                    STREAM_RINGBUF_PACKETS,
                    std::ptr::null(),
                    board_id,
                    input.as_ptr(),
                )
            },
            "start_stream",
        )
    }
    fn stop_stream(&self, board_id: c_int, input: &CString) -> Result<()> {
        Self::check(
            unsafe { (self.stop_stream)(board_id, input.as_ptr()) },
            "stop_stream",
        )
    }
    fn release(&self, board_id: c_int, input: &CString) -> Result<()> {
        Self::check(
            unsafe { (self.release_session)(board_id, input.as_ptr()) },
            "release_session",
        )
    }
    fn sampling_rate(&self, board_id: c_int) -> Result<c_int> {
        let mut rate: c_int = 0;
        Self::check(
            unsafe { (self.get_sampling_rate)(board_id, PRESET_DEFAULT, &mut rate as *mut c_int) },
            "get_sampling_rate",
        )?;
        Ok(rate)
    }
    fn num_rows(&self, board_id: c_int) -> Result<c_int> {
        let mut rows: c_int = 0;
        Self::check(
            unsafe { (self.get_num_rows)(board_id, PRESET_DEFAULT, &mut rows as *mut c_int) },
            "get_num_rows",
        )?;
        Ok(rows)
    }
    fn eeg_channels(&self, board_id: c_int, max_channels: usize) -> Result<Vec<c_int>> {
        let mut out_len: c_int = 0;
        let mut buf = vec![0 as c_int; max_channels.max(32)];
        Self::check(
            unsafe {
                (self.get_eeg_channels)(
                    board_id,
                    PRESET_DEFAULT,
                    buf.as_mut_ptr(),
                    &mut out_len as *mut c_int,
                )
            },
            "get_eeg_channels",
        )?;
        buf.truncate(out_len.max(0) as usize);
        Ok(buf)
    }
    /// Copies up to `num_samples` of the newest rows into `buffer` (rows x returned samples).
    fn current_board_data(
        &self,
        board_id: c_int,
        num_rows: usize,
        input: &CString,
        num_samples: usize,
        buffer: &mut [f64],
    ) -> Result<usize> {
        let expected = num_rows * num_samples;
        if buffer.len() < expected {
            return Err(anyhow!("buffer too small: {} < {}", buffer.len(), expected));
        }
        let mut current_size: c_int = 0;
        Self::check(
            unsafe {
                (self.get_current_board_data)(
                    num_samples as c_int,
                    PRESET_DEFAULT,
                    buffer.as_mut_ptr(),
                    &mut current_size as *mut c_int,
                    board_id,
                    input.as_ptr(),
                )
            },
            "get_current_board_data",
        )?;
        Ok(current_size.max(0) as usize)
    }
}
/// Splits BrainFlow's row-major `rows x available` block into per-channel series
/// for the given EEG rows.
fn eeg_rows(buf: &[f64], num_rows: usize, available: usize, eeg_channels: &[c_int]) -> Vec<Vec<f64>> {
    eeg_channels
        .iter()
        .map(|&row| row.max(0) as usize)
        .filter(|&row| row < num_rows)
        .map(|row| {
            let start = row * available;
            buf.get(start..start + available)
                .map(|s| s.to_vec())
                .unwrap_or_default()
        })
        .collect()
}
/// BrainFlow-backed streaming session for an OpenBCI board (Cyton + Daisy by default).
pub struct OpenBciSession {
    port_name: String,
    board_id: c_int,
    api: &'static BrainFlowApi,
    input_json: CString,
    eeg_channels: Vec<c_int>,
    num_rows: usize,
    sample_rate_hz: f64,
    buf: Vec<f64>,
    is_streaming: bool,
    released: bool,
}
impl OpenBciSession {
    /// Prepares a BrainFlow session on `config.serial_port` without streaming yet.
    pub fn connect(config: &BoardConfig) -> Result<Self> {
        let api = BrainFlowApi::instance()?;
        let board_id = config.board_id as c_int;
        let params = BrainFlowInputParams::for_serial(&config.serial_port);
        let json = serde_json::to_string(&params)?;
        let input_json =
            CString::new(json).context("failed to encode BrainFlow input params to C string")?;
        api.prepare(board_id, &input_json)?;
        let mut session = Self {
            port_name: config.serial_port.clone(),
            board_id,
            api,
            input_json,
            eeg_channels: Vec::new(),
            num_rows: 0,
            sample_rate_hz: 0.0,
            buf: Vec::new(),
            is_streaming: false,
            released: false,
        };
        // from here on Drop releases the prepared session if anything fails
        session.sample_rate_hz = api.sampling_rate(board_id)? as f64;
        session.num_rows = api.num_rows(board_id)? as usize;
        session.eeg_channels = api.eeg_channels(board_id, session.num_rows)?;
        Ok(session)
    }
    /// Connects and starts streaming; the usual entry point for the engine.
    pub fn open(config: &BoardConfig) -> Result<Self, SourceError> {
        let mut session =
            Self::connect(config).map_err(|e| SourceError::Unavailable(format!("{e:#}")))?;
        session
            .start_stream()
            .map_err(|e| SourceError::Unavailable(format!("{e:#}")))?;
        info!(
            "BrainFlow stream open on {} (sr={}, {} EEG channels)",
            session.port_name,
            session.sample_rate_hz,
            session.eeg_channels.len()
        );
        Ok(session)
    }
    pub fn start_stream(&mut self) -> Result<()> {
        if !self.is_streaming {
            self.api.start_stream(self.board_id, &self.input_json)?;
            self.is_streaming = true;
        }
        Ok(())
    }
    pub fn stop_stream(&mut self) -> Result<()> {
        if !self.released {
            // release even when stopping fails, then report the first error
            let stopped = if self.is_streaming {
                self.is_streaming = false;
                self.api.stop_stream(self.board_id, &self.input_json)
            } else {
                Ok(())
            };
            self.released = true;
            let released = self.api.release(self.board_id, &self.input_json);
            stopped.and(released)?;
        }
        Ok(())
    }
    /// Newest `max_samples` samples of every EEG channel (fewer while the stream ramps up).
    pub fn current_window(&mut self, max_samples: usize) -> Result<RawWindow> {
        let needed = self.num_rows * max_samples;
        if self.buf.len() < needed {
            self.buf.resize(needed, 0.0);
        }
        let available = self.api.current_board_data(
            self.board_id,
            self.num_rows,
            &self.input_json,
            max_samples,
            &mut self.buf,
        )?;
        Ok(RawWindow {
            sample_rate_hz: self.sample_rate_hz,
            samples: eeg_rows(&self.buf, self.num_rows, available, &self.eeg_channels),
        })
    }
}
impl SampleSource for OpenBciSession {
    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    fn latest(&mut self, max_samples: usize) -> Result<RawWindow, SourceError> {
        self.current_window(max_samples)
            .map_err(|e| SourceError::Stream(format!("{e:#}")))
    }
    fn release(&mut self) -> Result<(), SourceError> {
        self.stop_stream()
            .map_err(|e| SourceError::Stream(format!("{e:#}")))
    }
}
impl Drop for OpenBciSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop_stream() {
            warn!("BrainFlow session cleanup failed: {e:#}");
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn eeg_rows_follow_row_major_layout() {
        // 3 rows x 2 samples: [row0..., row1..., row2...]
        let buf = [0.0, 1.0, 10.0, 11.0, 20.0, 21.0, 99.0, 99.0];
        let rows = eeg_rows(&buf, 3, 2, &[1, 2, 7]);
        assert_eq!(rows, vec![vec![10.0, 11.0], vec![20.0, 21.0]]);
    }
    #[test]
    fn input_params_are_brainflow_json() {
        let json = serde_json::to_string(&BrainFlowInputParams::for_serial("COM3")).unwrap();
        assert!(json.contains(r#""serial_port":"COM3""#));
        assert!(json.contains(r#""master_board":-100"#));
    }
}
