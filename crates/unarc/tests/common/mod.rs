//! Scripted stand-in for the native engine.
//!
//! It drives the real callback trampoline with C strings and raw buffers,
//! the same way the native library does.

#![allow(dead_code)]

use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::sync::Mutex;
use unarc::{Engine, RawCallback, Result};

const CANARY: u8 = 0xA5;
const CANARY_LEN: usize = 8;

/// One callback the engine will make.
#[derive(Debug, Clone)]
pub enum Step {
    /// A plain event
    Emit {
        tag: &'static str,
        int1: i32,
        int2: i32,
        text: Vec<u8>,
    },
    /// An `overwrite?` request; a `'q'` answer ends the call with failure
    Overwrite { size: i32, name: String },
    /// A `password?` request with a buffer of `buffer_size` bytes
    Password { buffer_size: i32 },
}

impl Step {
    pub fn emit(tag: &'static str, int1: i32, int2: i32, text: &str) -> Self {
        Self::emit_bytes(tag, int1, int2, text.as_bytes())
    }

    /// A plain event whose string is sent as these exact bytes.
    pub fn emit_bytes(tag: &'static str, int1: i32, int2: i32, text: &[u8]) -> Self {
        Step::Emit {
            tag,
            int1,
            int2,
            text: text.to_vec(),
        }
    }
}

/// What the engine observed during one call.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub args: Vec<String>,
    /// Arguments exactly as the engine received them
    pub raw_args: Vec<Vec<u8>>,
    pub responses: Vec<i32>,
    /// Passwords found in the buffer after each `password?` callback
    pub passwords: Vec<Option<String>>,
    /// Whether the bytes after each password buffer were left alone
    pub canaries_intact: Vec<bool>,
}

type Script = dyn Fn(&[String]) -> Vec<Step> + Send + Sync;

pub struct ScriptedEngine {
    script: Box<Script>,
    status: i32,
    records: Mutex<Vec<Record>>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_script(move |_| steps.clone())
    }

    /// Build the callbacks from the argument vector of each call.
    pub fn with_script<F>(script: F) -> Self
    where
        F: Fn(&[String]) -> Vec<Step> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            status: 0,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn calls(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn last_record(&self) -> Record {
        self.records.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl Engine for ScriptedEngine {
    fn extract(&self, callback: RawCallback, args: &[CString]) -> Result<i32> {
        let raw = args;
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let mut record = Record {
            args: args.clone(),
            raw_args: raw.iter().map(|a| a.as_bytes().to_vec()).collect(),
            ..Default::default()
        };
        let mut status = self.status;

        for step in (self.script)(&args) {
            match step {
                Step::Emit {
                    tag,
                    int1,
                    int2,
                    text,
                } => {
                    let tag = CString::new(tag).unwrap();
                    let mut text = CString::new(text).unwrap().into_bytes_with_nul();
                    let response = unsafe {
                        callback(tag.as_ptr(), int1, int2, text.as_mut_ptr().cast::<c_char>())
                    };
                    record.responses.push(response);
                }
                Step::Overwrite { size, name } => {
                    let mut name = CString::new(name).unwrap().into_bytes_with_nul();
                    let response = unsafe {
                        callback(c"overwrite?".as_ptr(), 0, size, name.as_mut_ptr().cast::<c_char>())
                    };
                    record.responses.push(response);
                    if response == 'q' as i32 {
                        status = 1;
                        break;
                    }
                }
                Step::Password { buffer_size } => {
                    let len = usize::try_from(buffer_size).unwrap_or(0);
                    // No terminator anywhere: the bridge must not read this buffer
                    let mut buffer = vec![CANARY; len + CANARY_LEN];
                    let response = unsafe {
                        callback(
                            c"password?".as_ptr(),
                            buffer_size,
                            0,
                            buffer.as_mut_ptr().cast::<c_char>(),
                        )
                    };
                    record.responses.push(response);
                    record
                        .canaries_intact
                        .push(buffer[len..].iter().all(|b| *b == CANARY));
                    record.passwords.push(
                        CStr::from_bytes_until_nul(&buffer[..len])
                            .ok()
                            .map(|s| s.to_string_lossy().into_owned()),
                    );
                    if response == 'q' as i32 {
                        status = 1;
                        break;
                    }
                }
            }
        }

        self.records.lock().unwrap().push(record);
        Ok(status)
    }
}

/// The archive path: the argument right after `--`.
pub fn archive_arg(args: &[String]) -> &str {
    let pos = args.iter().position(|a| a == "--").unwrap();
    &args[pos + 1]
}

/// Split a size into the engine's (int1, int2) encoding.
pub fn split_size(size: u64) -> (i32, i32) {
    ((size >> 20) as u32 as i32, (size & 0xF_FFFF) as u32 as i32)
}

pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}
