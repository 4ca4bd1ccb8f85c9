//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Requests
//! Inputs are UTF-8 JSON of the form
//! `{"chapters": [<provider record>, ...], "cover": {"title": ..., ...}}`
//! where each record has the provider shape (`chapter` + `verses`). Records
//! are validated exactly as the directory provider validates them.
//!
//! ## Memory management
//! - Buffers returned by `chapterbook_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `chapterbook_free_buffer` / `chapterbook_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` (0 = success, non-zero = error):
//!   1 null argument, 2 invalid UTF-8, 3 invalid request, 4 generation failed.
//! - Error details can be retrieved via `chapterbook_last_error`.
//!
//! ## Thread safety
//! - `chapterbook_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use serde::Deserialize;

use crate::assembler::{Assembler, AssemblyConfig};
use crate::content::{CoverOptions, SectionData};
use crate::error::InputError;
use crate::pagination::PageGeometry;
use crate::pipeline::Pipeline;
use crate::provider::SectionRecord;
use crate::raster::HtmlRasterizer;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

const ERR_NULL: c_int = 1;
const ERR_UTF8: c_int = 2;
const ERR_REQUEST: c_int = 3;
const ERR_GENERATE: c_int = 4;

#[derive(Deserialize)]
struct BookRequest {
    chapters: Vec<SectionRecord>,
    #[serde(default)]
    cover: CoverOptions,
}

impl BookRequest {
    fn parse(json: &str) -> Result<(Vec<SectionData>, CoverOptions), InputError> {
        let request: BookRequest = serde_json::from_str(json)?;
        if request.chapters.is_empty() {
            return Err(InputError::NoSectionsSelected);
        }
        let sections = request
            .chapters
            .into_iter()
            .map(SectionRecord::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((sections, request.cover))
    }
}

// ---------------------------------------------------------------------------
// C-compatible configuration types
// ---------------------------------------------------------------------------

/// Optional page geometry for the `*_ex` functions.
///
/// Fields set to `0` fall back to the A4 defaults (210 × 297 mm, 15 mm margin).
#[repr(C)]
pub struct ChapterbookPageConfig {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
}

fn geometry_from_c(cfg: Option<&ChapterbookPageConfig>) -> PageGeometry {
    let defaults = PageGeometry::default();
    let Some(cfg) = cfg else {
        return defaults;
    };
    let or_default = |v: f64, d: f64| if v > 0.0 { v } else { d };
    PageGeometry {
        page_width_mm: or_default(cfg.page_width_mm, defaults.page_width_mm),
        page_height_mm: or_default(cfg.page_height_mm, defaults.page_height_mm),
        margin_mm: or_default(cfg.margin_mm, defaults.margin_mm),
    }
}

/// Read the request bytes as UTF-8, recording an error code on failure.
///
/// # Safety
/// `ptr` must point to `len` valid bytes.
unsafe fn request_str<'a>(ptr: *const u8, len: u32) -> Result<&'a str, c_int> {
    let bytes = slice::from_raw_parts(ptr, len as usize);
    std::str::from_utf8(bytes).map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })
}

fn parse_request(json: &str) -> Result<(Vec<SectionData>, CoverOptions), c_int> {
    BookRequest::parse(json).map_err(|e| {
        set_last_error(&e.to_string());
        ERR_REQUEST
    })
}

fn generate(json: &str, geometry: PageGeometry) -> Result<(Vec<u8>, String), c_int> {
    geometry.validate().map_err(|e| {
        set_last_error(&e.to_string());
        ERR_REQUEST
    })?;
    let (sections, cover) = parse_request(json)?;
    let pipeline = Pipeline::new(AssemblyConfig {
        geometry,
        ..AssemblyConfig::default()
    });
    let mut rasterizer = HtmlRasterizer::default();
    let (document, artifact) = pipeline
        .build(&sections, &cover, &mut rasterizer)
        .map_err(|e| {
            set_last_error(&e.to_string());
            ERR_GENERATE
        })?;
    let json = document.layout().to_json().map_err(|e| {
        set_last_error(&e.to_string());
        ERR_GENERATE
    })?;
    Ok((artifact.bytes, json))
}

/// Hand a byte buffer to the caller.
///
/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn emit_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) {
    let len = bytes.len() as u32;
    let raw = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    *out_buf = raw;
    *out_len = len;
}

/// Hand a string to the caller.
///
/// # Safety
/// `out` must be a valid pointer.
unsafe fn emit_string(s: String, out: *mut *mut c_char) -> c_int {
    match CString::new(s) {
        Ok(cs) => {
            *out = cs.into_raw();
            0
        }
        Err(_) => {
            set_last_error("JSON contained null byte");
            ERR_GENERATE
        }
    }
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Generate a PDF book from a JSON request.
///
/// # Parameters
/// - `json_ptr`: pointer to UTF-8 request bytes (not necessarily null-terminated)
/// - `json_len`: length of the request in bytes
/// - `out_buf`: on success, receives a pointer to heap-allocated PDF bytes
/// - `out_len`: on success, receives the length of the PDF buffer
///
/// # Returns
/// `0` on success, non-zero on error. On error, call `chapterbook_last_error`.
///
/// # Safety
/// - `json_ptr` must point to `json_len` valid bytes.
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `chapterbook_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn chapterbook_generate_pdf(
    json_ptr: *const u8,
    json_len: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    chapterbook_generate_pdf_ex(json_ptr, json_len, ptr::null(), out_buf, out_len)
}

/// Like [`chapterbook_generate_pdf`] with a custom page geometry.
///
/// # Safety
/// Same as `chapterbook_generate_pdf`. `cfg`, if non-null, must point to a
/// fully initialised [`ChapterbookPageConfig`].
#[no_mangle]
pub unsafe extern "C" fn chapterbook_generate_pdf_ex(
    json_ptr: *const u8,
    json_len: u32,
    cfg: *const ChapterbookPageConfig,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if json_ptr.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let json = match request_str(json_ptr, json_len) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match generate(json, geometry_from_c(cfg.as_ref())) {
        Ok((pdf, _)) => {
            emit_buffer(pdf, out_buf, out_len);
            0
        }
        Err(code) => code,
    }
}

/// Generate a PDF and also return the page layout JSON.
///
/// # Safety
/// Same as `chapterbook_generate_pdf`. Additionally, `*out_json_ptr` must be
/// freed with `chapterbook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn chapterbook_generate_pdf_with_layout(
    json_ptr: *const u8,
    json_len: u32,
    out_pdf_buf: *mut *mut u8,
    out_pdf_len: *mut u32,
    out_json_ptr: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_pdf_buf.is_null() || out_pdf_len.is_null() || out_json_ptr.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let json = match request_str(json_ptr, json_len) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match generate(json, PageGeometry::default()) {
        Ok((pdf, layout)) => {
            let rc = emit_string(layout, out_json_ptr);
            if rc == 0 {
                emit_buffer(pdf, out_pdf_buf, out_pdf_len);
            }
            rc
        }
        Err(code) => code,
    }
}

/// Compute the page layout only (no PDF). Blocks are still rasterized,
/// since their heights drive pagination.
///
/// # Safety
/// `json_ptr` must point to `json_len` valid bytes and `out_json_ptr` must
/// be a valid pointer. Free the result with `chapterbook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn chapterbook_compute_layout(
    json_ptr: *const u8,
    json_len: u32,
    out_json_ptr: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_json_ptr.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let json = match request_str(json_ptr, json_len) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let (sections, cover) = match parse_request(json) {
        Ok(parsed) => parsed,
        Err(code) => return code,
    };
    let mut rasterizer = HtmlRasterizer::default();
    let layout = Assembler::default()
        .assemble(&sections, &cover, &mut rasterizer)
        .map_err(|e| e.to_string())
        .and_then(|doc| doc.layout().to_json().map_err(|e| e.to_string()));
    match layout {
        Ok(json) => emit_string(json, out_json_ptr),
        Err(msg) => {
            set_last_error(&msg);
            ERR_GENERATE
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `chapterbook_generate_pdf`.
///
/// # Safety
/// `buf` must have been returned by a previous `chapterbook_generate_pdf`
/// (or similar) call, and `len` must be the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn chapterbook_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by a layout function.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn chapterbook_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message, or null if none occurred.
///
/// The returned pointer is valid until the next `chapterbook_*` call on the
/// same thread. The caller must **not** free it.
#[no_mangle]
pub extern "C" fn chapterbook_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn chapterbook_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
