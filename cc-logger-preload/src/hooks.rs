// SPDX-License-Identifier: GPL-3.0-or-later

//! The actual intercepted symbols.
//!
//! Grounded on `intercept-preload/src/implementation.rs`: a cached,
//! atomically-stored pointer per libc symbol resolved once via
//! `dlsym(RTLD_NEXT, ...)`, and a hook per ABI entry point that records
//! the call before tail-calling into the real function. Unlike a
//! TCP-collector-based reporter, this hook calls straight into
//! [`cc_logger::record_execution`], which classifies the invocation and
//! appends to the compilation database itself, in-process.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;

const RTLD_NEXT: i32 = -1;

type ExecveFn = unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;
type ExecvFn = unsafe extern "C" fn(*const c_char, *const *const c_char) -> c_int;
type PosixSpawnFn = unsafe extern "C" fn(
    *mut libc::pid_t,
    *const c_char,
    *const libc::c_void,
    *const libc::c_void,
    *const *const c_char,
    *const *const c_char,
) -> c_int;

static REAL_EXECVE: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());
static REAL_EXECV: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());
static REAL_EXECVP: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());
static REAL_EXECVPE: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());
static REAL_POSIX_SPAWN: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());
static REAL_POSIX_SPAWNP: AtomicPtr<libc::c_void> = AtomicPtr::new(std::ptr::null_mut());

static INIT_GUARD: Mutex<()> = Mutex::new(());

fn resolve(name: &str) -> *mut libc::c_void {
    let cname = CString::new(name).expect("symbol name has no interior NUL");
    unsafe { libc::dlsym(RTLD_NEXT as *mut libc::c_void, cname.as_ptr()) }
}

fn initialize_functions() {
    let _guard = INIT_GUARD.lock().unwrap_or_else(|e| e.into_inner());
    REAL_EXECVE.store(resolve("execve"), Ordering::SeqCst);
    REAL_EXECV.store(resolve("execv"), Ordering::SeqCst);
    REAL_EXECVP.store(resolve("execvp"), Ordering::SeqCst);
    REAL_EXECVPE.store(resolve("execvpe"), Ordering::SeqCst);
    REAL_POSIX_SPAWN.store(resolve("posix_spawn"), Ordering::SeqCst);
    REAL_POSIX_SPAWNP.store(resolve("posix_spawnp"), Ordering::SeqCst);
}

#[ctor::ctor]
fn on_load() {
    let _ = env_logger::try_init();
    initialize_functions();
    log::debug!("cc-logger-preload {} loaded", crate::PRELOAD_VERSION);
}

unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}

unsafe fn collect_args(argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut i = 0isize;
    loop {
        let entry = unsafe { *argv.offset(i) };
        if entry.is_null() {
            break;
        }
        out.push(unsafe { cstr_to_string(entry) });
        i += 1;
    }
    out
}

/// Records one invocation, swallowing every error: a build must never
/// fail because the logger couldn't write its database.
///
/// `argv` is the full vector captured from the call, including `argv[0]`;
/// `cc_logger::record_execution` prepends `program` itself when building
/// the command, so `argv[0]` is dropped here to avoid recording it twice.
fn report(program: &str, argv: &[String]) {
    let args = argv.get(1..).unwrap_or(&[]);
    if let Err(err) = cc_logger::record_execution(program, args) {
        log::warn!("cc-logger-preload: failed to record {program}: {err}");
    }
}

macro_rules! load_real {
    ($slot:expr, $ty:ty) => {{
        let ptr = $slot.load(Ordering::SeqCst);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { std::mem::transmute::<*mut libc::c_void, $ty>(ptr) })
        }
    }};
}

fn fail_no_such_symbol(symbol: &str) -> c_int {
    let err = cc_logger::error::LoggerError::SymbolResolution(symbol.to_string());
    log::error!("cc-logger-preload: {err}");
    unsafe { *libc::__errno_location() = libc::ENOSYS };
    -1
}

/// # Safety
/// Called by the dynamic linker in place of libc's `execve`; `path`,
/// `argv`, and `envp` must satisfy the same contract the real `execve`
/// requires (NUL-terminated C strings, NULL-terminated pointer arrays).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_EXECVE, ExecveFn) {
        Some(f) => unsafe { f(path, argv, envp) },
        None => fail_no_such_symbol("execve"),
    }
}

/// # Safety
/// See [`execve`]; this hook additionally inherits the calling process's
/// environment, matching the real `execv`'s contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execv(path: *const c_char, argv: *const *const c_char) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_EXECV, ExecvFn) {
        Some(f) => unsafe { f(path, argv) },
        None => fail_no_such_symbol("execv"),
    }
}

/// # Safety
/// See [`execv`]; `path` is resolved against `PATH` by the real function,
/// not by this hook.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execvp(path: *const c_char, argv: *const *const c_char) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_EXECVP, ExecvFn) {
        Some(f) => unsafe { f(path, argv) },
        None => fail_no_such_symbol("execvp"),
    }
}

/// # Safety
/// See [`execve`] and [`execvp`]; combines `PATH` resolution with an
/// explicit environment.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execvpe(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_EXECVPE, ExecveFn) {
        Some(f) => unsafe { f(path, argv, envp) },
        None => fail_no_such_symbol("execvpe"),
    }
}

/// # Safety
/// Called in place of libc's `posix_spawn`; `file_actions` and `attrp`
/// are forwarded untouched, so their validity is the caller's
/// responsibility exactly as it is for the real function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_spawn(
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::c_void,
    attrp: *const libc::c_void,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_POSIX_SPAWN, PosixSpawnFn) {
        Some(f) => unsafe { f(pid, path, file_actions, attrp, argv, envp) },
        None => fail_no_such_symbol("posix_spawn"),
    }
}

/// # Safety
/// See [`posix_spawn`]; `path` is resolved against `PATH` by the real
/// function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_spawnp(
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::c_void,
    attrp: *const libc::c_void,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let program = unsafe { cstr_to_string(path) };
    let args = unsafe { collect_args(argv) };
    report(&program, &args);
    match load_real!(REAL_POSIX_SPAWNP, PosixSpawnFn) {
        Some(f) => unsafe { f(pid, path, file_actions, attrp, argv, envp) },
        None => fail_no_such_symbol("posix_spawnp"),
    }
}
