//! Process-wide registration of the `sqlite-vec` extension.
//!
//! Registration uses `sqlite3_auto_extension`, so it only affects
//! connections opened afterwards. Set `HYBRAG_SQLITE_VEC=0` to keep it off;
//! the vector source then uses its pure-Rust cosine scan.
#![allow(unsafe_code)]

use std::sync::OnceLock;

/// Environment switch; `0`, `false`, or `off` disables registration.
pub const AUTO_ENABLE_ENV: &str = "HYBRAG_SQLITE_VEC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VecExtError {
    #[error("sqlite-vec disabled by {AUTO_ENABLE_ENV}")]
    Disabled,
    #[error("sqlite3_auto_extension failed with rc={0}")]
    Registration(i32),
}

static REGISTRATION: OnceLock<Result<(), VecExtError>> = OnceLock::new();

/// Register `sqlite-vec` for every connection opened from now on.
///
/// Idempotent; the first outcome is cached.
///
/// # Errors
///
/// [`VecExtError::Disabled`] when switched off through the environment,
/// [`VecExtError::Registration`] if SQLite refuses the entry point.
pub fn register_sqlite_vec() -> Result<(), VecExtError> {
    if matches!(
        std::env::var(AUTO_ENABLE_ENV).ok().as_deref(),
        Some("0" | "false" | "off")
    ) {
        return Err(VecExtError::Disabled);
    }

    REGISTRATION.get_or_init(register_once).clone()
}

type ExtensionInit = unsafe extern "C" fn(
    *mut rusqlite::ffi::sqlite3,
    *mut *const std::os::raw::c_char,
    *const rusqlite::ffi::sqlite3_api_routines,
) -> std::os::raw::c_int;

fn register_once() -> Result<(), VecExtError> {
    // SAFETY: `sqlite3_vec_init` is a standard SQLite extension entry point;
    // `sqlite-vec` exports it with a placeholder signature.
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: ExtensionInit =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    // SAFETY: registering a valid entry point is always sound.
    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(VecExtError::Registration(rc))
    }
}

/// Whether `vec_version()` is callable on `conn`.
#[must_use]
pub fn is_available(conn: &rusqlite::Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}
