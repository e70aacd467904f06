//! FFI bindings for TheraType
//!
//! This module provides C-compatible functions so a host UI can embed the typing engine.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `theratype_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalyzerConfig;
use crate::error::TypingError;
use crate::jamo::count_jamo;
use crate::pipeline::{live_feedback, session_to_summary_json, TypingProcessor};
use crate::storage::InMemorySessionStore;
use crate::types::{KeyEvent, SessionContext};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a required C string argument, recording an error naming `what` on failure
unsafe fn required_string(ptr: *const c_char, what: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {what} string pointer"));
    }
    value
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Return a JSON result as a C string, or NULL with the error recorded
fn json_result(result: Result<String, TypingError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return 0 on success, or -1 with the error recorded
fn status_result(result: Result<(), TypingError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Summarize a finished session given as session input JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `theratype_free_string`.
/// - Returns NULL on error; call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_session_to_summary(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = required_string(json, "JSON") else {
        return ptr::null_mut();
    };

    json_result(session_to_summary_json(&json_str))
}

/// Per-character feedback, accuracy and speed as JSON.
///
/// # Safety
/// - `target` and `typed` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `theratype_free_string`.
/// - Returns NULL on error; call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_live_feedback(
    target: *const c_char,
    typed: *const c_char,
    elapsed_ms: u64,
    is_composing: bool,
) -> *mut c_char {
    clear_last_error();

    let Some(target_str) = required_string(target, "target") else {
        return ptr::null_mut();
    };
    let Some(typed_str) = required_string(typed, "typed") else {
        return ptr::null_mut();
    };

    let feedback = live_feedback(&target_str, &typed_str, elapsed_ms, is_composing);
    json_result(serde_json::to_string(&feedback).map_err(TypingError::from))
}

/// Number of jamo in `text`, or -1 on error.
///
/// # Safety
/// - `text` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn theratype_count_jamo(text: *const c_char) -> i64 {
    clear_last_error();

    match required_string(text, "text") {
        Some(text_str) => count_jamo(&text_str) as i64,
        None => -1,
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a TypingProcessor
pub struct TypingProcessorHandle {
    processor: TypingProcessor<InMemorySessionStore>,
}

/// Create a new TypingProcessor keeping `max_recent_sessions` full sessions.
///
/// # Safety
/// - Returns a pointer to a newly allocated TypingProcessor.
/// - Must be freed with `theratype_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_new(
    max_recent_sessions: i32,
) -> *mut TypingProcessorHandle {
    clear_last_error();

    let mut config = AnalyzerConfig::default();
    if max_recent_sessions > 0 {
        config.max_recent_sessions = max_recent_sessions as usize;
    }

    let processor = TypingProcessor::with_config(config);
    let handle = Box::new(TypingProcessorHandle { processor });
    Box::into_raw(handle)
}

/// Free a TypingProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_free(processor: *mut TypingProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Borrow the processor behind a handle, recording an error for NULL
unsafe fn processor_mut<'a>(
    processor: *mut TypingProcessorHandle,
) -> Option<&'a mut TypingProcessor<InMemorySessionStore>> {
    if processor.is_null() {
        set_last_error("Null processor pointer");
        return None;
    }
    Some(&mut (*processor).processor)
}

/// Start typing a new target sentence at `now` (ms).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `target` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_begin(
    processor: *mut TypingProcessorHandle,
    target: *const c_char,
    now: i64,
) -> i32 {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return -1;
    };
    let Some(target_str) = required_string(target, "target") else {
        return -1;
    };

    status_result(processor.begin_sentence(&target_str, now))
}

/// Record a key-down event.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `key` and `typed_so_far` must be valid null-terminated C strings.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_key_down(
    processor: *mut TypingProcessorHandle,
    key: *const c_char,
    timestamp: i64,
    typed_so_far: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return -1;
    };
    let Some(key_str) = required_string(key, "key") else {
        return -1;
    };
    let Some(typed_str) = required_string(typed_so_far, "typed") else {
        return -1;
    };

    processor.key_down(&KeyEvent::new(key_str, timestamp), &typed_str);
    0
}

/// Record a key-up event.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `key` and `typed_so_far` must be valid null-terminated C strings.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_key_up(
    processor: *mut TypingProcessorHandle,
    key: *const c_char,
    timestamp: i64,
    typed_so_far: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return -1;
    };
    let Some(key_str) = required_string(key, "key") else {
        return -1;
    };
    let Some(typed_str) = required_string(typed_so_far, "typed") else {
        return -1;
    };

    processor.key_up(&KeyEvent::new(key_str, timestamp), &typed_str);
    0
}

/// Notify the processor that an IME composition started.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_composition_start(
    processor: *mut TypingProcessorHandle,
) -> i32 {
    clear_last_error();

    match processor_mut(processor) {
        Some(processor) => {
            processor.composition_start();
            0
        }
        None => -1,
    }
}

/// Notify the processor that an IME composition committed `composed`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `composed` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_composition_end(
    processor: *mut TypingProcessorHandle,
    composed: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return -1;
    };
    let Some(composed_str) = required_string(composed, "composed") else {
        return -1;
    };

    processor.composition_end(&composed_str);
    0
}

/// Live feedback for the sentence in progress as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `typed` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `theratype_free_string`.
/// - Returns NULL on error; call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_feedback(
    processor: *mut TypingProcessorHandle,
    typed: *const c_char,
    now: i64,
) -> *mut c_char {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return ptr::null_mut();
    };
    let Some(typed_str) = required_string(typed, "typed") else {
        return ptr::null_mut();
    };

    json_result(
        processor
            .live_feedback(&typed_str, now)
            .and_then(|feedback| serde_json::to_string(&feedback).map_err(TypingError::from)),
    )
}

/// Complete the sentence in progress and return the stored session as JSON.
///
/// `context_json` is a session context document such as `{"mode":"insight"}`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `typed` and `context_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `theratype_free_string`.
/// - Returns NULL on error; call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_complete(
    processor: *mut TypingProcessorHandle,
    typed: *const c_char,
    end_time: i64,
    context_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return ptr::null_mut();
    };
    let Some(typed_str) = required_string(typed, "typed") else {
        return ptr::null_mut();
    };
    let Some(context_str) = required_string(context_json, "context") else {
        return ptr::null_mut();
    };

    let result = serde_json::from_str::<SessionContext>(&context_str)
        .map_err(|e| TypingError::ParseError(e.to_string()))
        .and_then(|context| processor.complete(&typed_str, end_time, context))
        .and_then(|stored| serde_json::to_string(&stored).map_err(TypingError::from));

    json_result(result)
}

/// Save the processor's session store to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - Returns a newly allocated string that must be freed with `theratype_free_string`.
/// - Returns NULL on error; call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_save_store(
    processor: *mut TypingProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    match processor_mut(processor) {
        Some(processor) => json_result(processor.store().to_json()),
        None => ptr::null_mut(),
    }
}

/// Replace the processor's session store with one loaded from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `theratype_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `theratype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn theratype_processor_load_store(
    processor: *mut TypingProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(processor) = processor_mut(processor) else {
        return -1;
    };
    let Some(json_str) = required_string(json, "JSON") else {
        return -1;
    };

    status_result(InMemorySessionStore::from_json(&json_str).map(|store| {
        *processor.store_mut() = store;
    }))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by TheraType functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a TheraType function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn theratype_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next TheraType function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn theratype_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the TheraType library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn theratype_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_session_json() -> CString {
        CString::new(
            r#"{
                "target": "안녕",
                "typed": "안녕",
                "start_time": 0,
                "end_time": 60000,
                "keystroke_log": [
                    { "timestamp": 0 },
                    { "timestamp": 300 },
                    { "timestamp": 650 }
                ]
            }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        theratype_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_session_to_summary() {
        let json = sample_session_json();
        unsafe {
            let result = take_string(theratype_session_to_summary(json.as_ptr()));
            assert!(result.contains("\"typing_speed\": 6"));
            assert!(result.contains("completed_at"));
        }
    }

    #[test]
    fn test_ffi_live_feedback_and_count() {
        let target = CString::new("안녕").unwrap();
        let typed = CString::new("아").unwrap();
        unsafe {
            let result = take_string(theratype_live_feedback(
                target.as_ptr(),
                typed.as_ptr(),
                0,
                true,
            ));
            assert!(result.contains("\"composing\""));
            assert_eq!(theratype_count_jamo(target.as_ptr()), 6);
            assert_eq!(theratype_count_jamo(ptr::null()), -1);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = theratype_processor_new(10);
            assert!(!processor.is_null());

            let target = CString::new("가").unwrap();
            assert_eq!(theratype_processor_begin(processor, target.as_ptr(), 0), 0);

            let key = CString::new("가").unwrap();
            let empty = CString::new("").unwrap();
            assert_eq!(
                theratype_processor_key_down(processor, key.as_ptr(), 100, empty.as_ptr()),
                0
            );
            assert_eq!(
                theratype_processor_key_up(processor, key.as_ptr(), 180, target.as_ptr()),
                0
            );
            assert_eq!(theratype_processor_composition_start(processor), 0);
            assert_eq!(
                theratype_processor_composition_end(processor, target.as_ptr()),
                0
            );

            let feedback = take_string(theratype_processor_feedback(
                processor,
                target.as_ptr(),
                1_000,
            ));
            assert!(feedback.contains("\"correct\""));

            let context = CString::new(r#"{"mode":"insight"}"#).unwrap();
            let stored = take_string(theratype_processor_complete(
                processor,
                target.as_ptr(),
                1_000,
                context.as_ptr(),
            ));
            assert!(stored.contains("session_id"));

            // Move the store into a second processor
            let saved = theratype_processor_save_store(processor);
            assert!(!saved.is_null());
            let processor2 = theratype_processor_new(0);
            assert_eq!(theratype_processor_load_store(processor2, saved), 0);
            assert_eq!((*processor2).processor.store().recent_count(), 1);

            theratype_free_string(saved);
            theratype_processor_free(processor);
            theratype_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = theratype_session_to_summary(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = theratype_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("parse"));

            let context = CString::new(r#"{"mode":"insight"}"#).unwrap();
            let typed = CString::new("a").unwrap();
            assert!(theratype_processor_complete(
                ptr::null_mut(),
                typed.as_ptr(),
                0,
                context.as_ptr()
            )
            .is_null());
        }
    }

    #[test]
    fn test_ffi_complete_without_sentence() {
        unsafe {
            let processor = theratype_processor_new(0);
            let context = CString::new(r#"{"mode":"insight"}"#).unwrap();
            let typed = CString::new("a").unwrap();

            let result =
                theratype_processor_complete(processor, typed.as_ptr(), 0, context.as_ptr());
            assert!(result.is_null());

            let error_str = CStr::from_ptr(theratype_last_error()).to_str().unwrap();
            assert!(error_str.contains("No sentence"));

            theratype_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = theratype_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
