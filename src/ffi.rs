//! FFI bindings for Detox Detach
//!
//! This module provides C-compatible functions for loading a trained artifact bundle
//! and predicting risk tiers from other languages. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the caller
//! using `detox_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use crate::artifacts::ArtifactBundle;
use crate::inference::InferenceAdapter;
use crate::labels::categorize;
use crate::types::SubjectProfile;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

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

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Model API
// ============================================================================

/// Opaque handle to a loaded artifact bundle
pub struct DetoxModelHandle {
    adapter: InferenceAdapter,
}

/// Load the artifact bundle in `model_dir`.
///
/// Unobserved features use the default placeholder profile until
/// `detox_model_set_placeholders` is called.
///
/// # Safety
/// - `model_dir` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `detox_model_free`.
/// - Returns NULL on error; call `detox_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn detox_model_load(model_dir: *const c_char) -> *mut DetoxModelHandle {
    clear_last_error();

    let dir = match cstr_to_string(model_dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid model_dir string pointer");
            return ptr::null_mut();
        }
    };

    match ArtifactBundle::load(Path::new(&dir)) {
        Ok(bundle) => {
            let adapter =
                InferenceAdapter::without_analyzer(Arc::new(bundle), SubjectProfile::default());
            Box::into_raw(Box::new(DetoxModelHandle { adapter }))
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a loaded model.
///
/// # Safety
/// - `model` must be a valid pointer returned by `detox_model_load`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn detox_model_free(model: *mut DetoxModelHandle) {
    if !model.is_null() {
        drop(Box::from_raw(model));
    }
}

/// Replace the placeholder profile with a JSON object of subject attributes.
///
/// Missing attributes keep their defaults.
///
/// # Safety
/// - `model` must be a valid pointer returned by `detox_model_load`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error (see `detox_last_error`).
#[no_mangle]
pub unsafe extern "C" fn detox_model_set_placeholders(
    model: *mut DetoxModelHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if model.is_null() {
        set_last_error("Null model pointer");
        return -1;
    }
    let handle = &mut *model;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<SubjectProfile>(&json_str) {
        Ok(placeholders) => {
            handle.adapter.set_placeholders(placeholders);
            0
        }
        Err(e) => {
            set_last_error(&format!("Invalid placeholder JSON: {e}"));
            -1
        }
    }
}

/// Predict a risk tier from a collaborator-shaped observation JSON.
///
/// Accepts `{"Daily_Usage_Hours", "Phone_Checks_Per_Day", "Time_on_Social_Media"}`
/// (plus optional `Device_Type`), or an `{"error": ...}` object which is reported
/// as a failure. Returns the prediction as JSON.
///
/// # Safety
/// - `model` must be a valid pointer returned by `detox_model_load`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `detox_free_string`.
/// - Returns NULL on error; call `detox_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn detox_predict_observation(
    model: *const DetoxModelHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if model.is_null() {
        set_last_error("Null model pointer");
        return ptr::null_mut();
    }
    let handle = &*model;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let response = match serde_json::from_str(&json_str) {
        Ok(value) => value,
        Err(e) => {
            set_last_error(&format!("Invalid observation JSON: {e}"));
            return ptr::null_mut();
        }
    };

    let result = handle
        .adapter
        .predict_response(response)
        .and_then(|prediction| serde_json::to_string(&prediction).map_err(Into::into));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Map an addiction score to its tier (0, 1 or 2); -1 for a non-finite score.
#[no_mangle]
pub extern "C" fn detox_categorize_score(score: f64) -> i32 {
    if !score.is_finite() {
        return -1;
    }
    categorize(score).index() as i32
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Detox functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Detox function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn detox_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Detox function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn detox_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn detox_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fitted_bundle;

    fn saved_model_dir() -> (tempfile::TempDir, CString) {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();
        (dir, path)
    }

    unsafe fn last_error() -> String {
        let error = detox_last_error();
        assert!(!error.is_null());
        CStr::from_ptr(error).to_str().unwrap().to_string()
    }

    #[test]
    fn test_ffi_model_lifecycle() {
        let (_dir, path) = saved_model_dir();
        let observation = CString::new(
            r#"{"Daily_Usage_Hours": 2.0, "Phone_Checks_Per_Day": 15, "Time_on_Social_Media": 0.5}"#,
        )
        .unwrap();

        unsafe {
            let model = detox_model_load(path.as_ptr());
            assert!(!model.is_null());

            let result = detox_predict_observation(model, observation.as_ptr());
            assert!(!result.is_null());

            let json: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert!(json["tier"].as_u64().unwrap() <= 2);
            assert_eq!(json["observation"]["Phone_Checks_Per_Day"], 15);

            detox_free_string(result);
            detox_model_free(model);
        }
    }

    #[test]
    fn test_ffi_collaborator_error_is_reported() {
        let (_dir, path) = saved_model_dir();
        let error_json = CString::new(r#"{"error": "Extraction failed: timeout"}"#).unwrap();

        unsafe {
            let model = detox_model_load(path.as_ptr());
            let result = detox_predict_observation(model, error_json.as_ptr());
            assert!(result.is_null());
            assert_eq!(last_error(), "Extraction failed: timeout");
            detox_model_free(model);
        }
    }

    #[test]
    fn test_ffi_placeholders() {
        let (_dir, path) = saved_model_dir();
        let unseen = CString::new(r#"{"gender": "Unspecified"}"#).unwrap();
        let observation = CString::new(
            r#"{"Daily_Usage_Hours": 2.0, "Phone_Checks_Per_Day": 15, "Time_on_Social_Media": 0.5}"#,
        )
        .unwrap();

        unsafe {
            let model = detox_model_load(path.as_ptr());
            assert_eq!(detox_model_set_placeholders(model, unseen.as_ptr()), 0);

            let result = detox_predict_observation(model, observation.as_ptr());
            assert!(result.is_null());
            assert!(last_error().contains("Unspecified"));
            detox_model_free(model);
        }
    }

    #[test]
    fn test_ffi_load_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();

        unsafe {
            let model = detox_model_load(path.as_ptr());
            assert!(model.is_null());
            assert!(last_error().starts_with("Artifact mismatch"));
        }
    }

    #[test]
    fn test_ffi_categorize_score() {
        assert_eq!(detox_categorize_score(4.0), 0);
        assert_eq!(detox_categorize_score(5.0), 1);
        assert_eq!(detox_categorize_score(8.0), 2);
        assert_eq!(detox_categorize_score(f64::NAN), -1);
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = detox_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
