//! Loader-runtime emission.
//!
//! When a compile contains kernels, the orchestrator appends this module
//! to the generated target text. It dynamically loads the vendor driver,
//! resolves the fixed symbol set once behind a mutex, and exposes one
//! `launch_<name>` per kernel plus typed device-memory helpers. The
//! template is embedded in the compiler binary; only the per-kernel
//! functions are rendered per compile.

use crate::kernel::{KernelArtifact, KernelParamSig};

/// Module name the host lowering targets for launch rewrites.
pub const RUNTIME_MODULE: &str = "gpu_runtime";

const RUNTIME_PRELUDE: &str = r#"#[allow(dead_code)]
mod gpu_runtime {
  use std::ffi::{c_char, c_int, c_uint, c_void, CString};
  use std::marker::PhantomData;
  use std::sync::{Mutex, OnceLock};

  #[cfg(not(unix))]
  compile_error!("the kernel loader runtime requires a unix-like target");

  #[cfg(unix)]
  #[link(name = "dl")]
  extern "C" {
    fn dlopen(filename: *const c_char, flag: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
  }

  const RTLD_NOW: c_int = 2;

  type CuResult = c_int;
  type CuDevice = c_int;
  type CuContext = *mut c_void;
  type CuModule = *mut c_void;
  type CuFunction = *mut c_void;

  struct Api {
    init: unsafe extern "C" fn(c_uint) -> CuResult,
    device_get: unsafe extern "C" fn(*mut CuDevice, c_int) -> CuResult,
    ctx_create: unsafe extern "C" fn(*mut CuContext, c_uint, CuDevice) -> CuResult,
    ctx_destroy: unsafe extern "C" fn(CuContext) -> CuResult,
    ctx_synchronize: unsafe extern "C" fn() -> CuResult,
    ctx_set_current: unsafe extern "C" fn(CuContext) -> CuResult,
    mem_alloc: unsafe extern "C" fn(*mut u64, usize) -> CuResult,
    mem_free: unsafe extern "C" fn(u64) -> CuResult,
    memcpy_htod: unsafe extern "C" fn(u64, *const c_void, usize) -> CuResult,
    memcpy_dtoh: unsafe extern "C" fn(*mut c_void, u64, usize) -> CuResult,
    module_load_data: unsafe extern "C" fn(*mut CuModule, *const c_void) -> CuResult,
    module_get_function:
      unsafe extern "C" fn(*mut CuFunction, CuModule, *const c_char) -> CuResult,
    launch_kernel: unsafe extern "C" fn(
      CuFunction,
      c_uint,
      c_uint,
      c_uint,
      c_uint,
      c_uint,
      c_uint,
      c_uint,
      *mut c_void,
      *mut *mut c_void,
      *mut *mut c_void,
    ) -> CuResult,
    get_error_name: unsafe extern "C" fn(CuResult, *mut *const c_char) -> CuResult,
    get_error_string: unsafe extern "C" fn(CuResult, *mut *const c_char) -> CuResult,
  }

  struct Driver {
    api: Api,
    context: CuContext,
  }

  // The context handle lives for the process; access is serialized by
  // the surrounding mutex.
  unsafe impl Send for Driver {}

  struct DriverCell {
    lock: Mutex<Driver>,
  }

  static DRIVER: OnceLock<DriverCell> = OnceLock::new();

  fn describe(api: Option<&Api>, code: CuResult) -> String {
    if let Some(api) = api {
      let mut name: *const c_char = std::ptr::null();
      let mut text: *const c_char = std::ptr::null();
      unsafe {
        (api.get_error_name)(code, &mut name);
        (api.get_error_string)(code, &mut text);
        let name = if name.is_null() {
          "CUDA_ERROR_UNKNOWN".to_string()
        } else {
          std::ffi::CStr::from_ptr(name).to_string_lossy().into_owned()
        };
        let text = if text.is_null() {
          String::new()
        } else {
          std::ffi::CStr::from_ptr(text).to_string_lossy().into_owned()
        };
        format!("{name}: {text}")
      }
    } else {
      format!("driver error {code}")
    }
  }

  fn check(api: &Api, code: CuResult, what: &str) {
    if code != 0 {
      panic!("{what} failed: {}", describe(Some(api), code));
    }
  }

  unsafe fn resolve(handle: *mut c_void, name: &str) -> *mut c_void {
    let symbol = CString::new(name).unwrap_or_default();
    let ptr = dlsym(handle, symbol.as_ptr());
    if ptr.is_null() {
      panic!("driver symbol {name} not found");
    }
    ptr
  }

  fn driver() -> &'static DriverCell {
    DRIVER.get_or_init(|| unsafe {
      let mut handle = std::ptr::null_mut();
      for candidate in ["libcuda.so.1", "libcuda.so"] {
        let cname = CString::new(candidate).unwrap_or_default();
        handle = dlopen(cname.as_ptr(), RTLD_NOW);
        if !handle.is_null() {
          break;
        }
      }
      if handle.is_null() {
        panic!("libcuda.so.1 / libcuda.so not found");
      }

      let api = Api {
        init: std::mem::transmute(resolve(handle, "cuInit")),
        device_get: std::mem::transmute(resolve(handle, "cuDeviceGet")),
        ctx_create: std::mem::transmute(resolve(handle, "cuCtxCreate_v2")),
        ctx_destroy: std::mem::transmute(resolve(handle, "cuCtxDestroy_v2")),
        ctx_synchronize: std::mem::transmute(resolve(handle, "cuCtxSynchronize")),
        ctx_set_current: std::mem::transmute(resolve(handle, "cuCtxSetCurrent")),
        mem_alloc: std::mem::transmute(resolve(handle, "cuMemAlloc_v2")),
        mem_free: std::mem::transmute(resolve(handle, "cuMemFree_v2")),
        memcpy_htod: std::mem::transmute(resolve(handle, "cuMemcpyHtoD_v2")),
        memcpy_dtoh: std::mem::transmute(resolve(handle, "cuMemcpyDtoH_v2")),
        module_load_data: std::mem::transmute(resolve(handle, "cuModuleLoadData")),
        module_get_function: std::mem::transmute(resolve(handle, "cuModuleGetFunction")),
        launch_kernel: std::mem::transmute(resolve(handle, "cuLaunchKernel")),
        get_error_name: std::mem::transmute(resolve(handle, "cuGetErrorName")),
        get_error_string: std::mem::transmute(resolve(handle, "cuGetErrorString")),
      };

      check(&api, (api.init)(0), "cuInit");
      let mut device: CuDevice = 0;
      check(&api, (api.device_get)(&mut device, 0), "cuDeviceGet");
      let mut context: CuContext = std::ptr::null_mut();
      check(&api, (api.ctx_create)(&mut context, 0, device), "cuCtxCreate");

      DriverCell {
        lock: Mutex::new(Driver { api, context }),
      }
    })
  }

  impl Drop for Driver {
    fn drop(&mut self) {
      unsafe {
        (self.api.ctx_destroy)(self.context);
      }
    }
  }

  pub struct DevicePtr<T> {
    handle: u64,
    len: usize,
    _marker: PhantomData<T>,
  }

  pub fn device_malloc<T: Copy>(len: usize) -> DevicePtr<T> {
    let cell = driver();
    let guard = match cell.lock.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    unsafe {
      (guard.api.ctx_set_current)(guard.context);
      let mut handle = 0u64;
      check(
        &guard.api,
        (guard.api.mem_alloc)(&mut handle, len * std::mem::size_of::<T>()),
        "cuMemAlloc",
      );
      DevicePtr { handle, len, _marker: PhantomData }
    }
  }

  pub fn device_free<T>(ptr: DevicePtr<T>) {
    let cell = driver();
    let guard = match cell.lock.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    unsafe {
      (guard.api.ctx_set_current)(guard.context);
      (guard.api.mem_free)(ptr.handle);
    }
  }

  pub fn memcpy_htod<T: Copy>(dst: &DevicePtr<T>, src: &[T]) {
    let cell = driver();
    let guard = match cell.lock.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    let bytes = src.len().min(dst.len) * std::mem::size_of::<T>();
    unsafe {
      (guard.api.ctx_set_current)(guard.context);
      check(
        &guard.api,
        (guard.api.memcpy_htod)(dst.handle, src.as_ptr() as *const c_void, bytes),
        "cuMemcpyHtoD",
      );
    }
  }

  pub fn memcpy_dtoh<T: Copy>(dst: &mut Vec<T>, src: &DevicePtr<T>) {
    let cell = driver();
    let guard = match cell.lock.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    let bytes = dst.len().min(src.len) * std::mem::size_of::<T>();
    unsafe {
      (guard.api.ctx_set_current)(guard.context);
      check(
        &guard.api,
        (guard.api.memcpy_dtoh)(dst.as_mut_ptr() as *mut c_void, src.handle, bytes),
        "cuMemcpyDtoH",
      );
    }
  }

  fn load_function(guard: &Driver, ptx: &str, name: &str) -> CuFunction {
    unsafe {
      let data = CString::new(ptx).unwrap_or_default();
      let mut module: CuModule = std::ptr::null_mut();
      check(
        &guard.api,
        (guard.api.module_load_data)(&mut module, data.as_ptr() as *const c_void),
        "cuModuleLoadData",
      );
      let cname = CString::new(name).unwrap_or_default();
      let mut func: CuFunction = std::ptr::null_mut();
      check(
        &guard.api,
        (guard.api.module_get_function)(&mut func, module, cname.as_ptr()),
        "cuModuleGetFunction",
      );
      func
    }
  }

  struct FnCell(CuFunction);
  unsafe impl Send for FnCell {}
  unsafe impl Sync for FnCell {}
"#;

const RUNTIME_EPILOGUE: &str = "}\n";

/// Render the whole runtime module for this compile's kernels.
pub fn render_runtime(kernels: &[KernelArtifact]) -> String {
    let mut out = String::from(RUNTIME_PRELUDE);
    for kernel in kernels {
        out.push('\n');
        out.push_str(&render_launch_fn(kernel));
    }
    out.push_str(RUNTIME_EPILOGUE);
    out
}

fn render_launch_fn(kernel: &KernelArtifact) -> String {
    let upper = kernel.name.to_uppercase();
    let mut params = vec![
        "gx: u32".to_string(),
        "gy: u32".to_string(),
        "gz: u32".to_string(),
        "bx: u32".to_string(),
        "by: u32".to_string(),
        "bz: u32".to_string(),
    ];
    let mut locals = String::new();
    let mut slots = Vec::new();
    for (i, sig) in kernel.params.iter().enumerate() {
        match sig {
            KernelParamSig::Scalar(kind) => {
                params.push(format!("a{i}: {}", kind.rust_name()));
                locals.push_str(&format!("    let mut p{i} = a{i};\n"));
            }
            KernelParamSig::GlobalPtr(kind) => {
                params.push(format!("a{i}: &DevicePtr<{}>", kind.rust_name()));
                locals.push_str(&format!("    let mut p{i} = a{i}.handle;\n"));
            }
        }
        slots.push(format!("&mut p{i} as *mut _ as *mut c_void"));
    }

    format!(
        r#"  static FUNC_{upper}: OnceLock<FnCell> = OnceLock::new();

  pub fn launch_{name}({params}) {{
    let cell = driver();
    let guard = match cell.lock.lock() {{
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }};
    unsafe {{
      (guard.api.ctx_set_current)(guard.context);
      let func = FUNC_{upper}.get_or_init(|| {{
        let ptx_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
          .join("kernels")
          .join("{name}.ptx");
        let ptx = std::fs::read_to_string(&ptx_path)
          .unwrap_or_else(|e| panic!("cannot read {{}}: {{e}}", ptx_path.display()));
        FnCell(load_function(&guard, &ptx, "{name}"))
      }});
{locals}      let mut args = [{slots}];
      check(
        &guard.api,
        (guard.api.launch_kernel)(
          func.0, gx, gy, gz, bx, by, bz, 0,
          std::ptr::null_mut(),
          args.as_mut_ptr(),
          std::ptr::null_mut(),
        ),
        "cuLaunchKernel",
      );
      check(&guard.api, (guard.api.ctx_synchronize)(), "cuCtxSynchronize");
    }}
  }}
"#,
        upper = upper,
        name = kernel.name,
        params = params.join(", "),
        locals = locals,
        slots = slots.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{KernelArtifact, KernelParamSig, ScalarKind};

    fn add_kernel() -> KernelArtifact {
        KernelArtifact {
            name: "add".to_string(),
            spec_text: "{ name: \"add\" }".to_string(),
            cuda_source: String::new(),
            params: vec![
                KernelParamSig::GlobalPtr(ScalarKind::F32),
                KernelParamSig::Scalar(ScalarKind::I32),
            ],
        }
    }

    #[test]
    fn test_runtime_contains_driver_plumbing() {
        let text = render_runtime(&[add_kernel()]);
        assert!(text.contains("mod gpu_runtime {"));
        assert!(text.contains("libcuda.so.1"));
        assert!(text.contains("cuModuleLoadData"));
        assert!(text.contains("pub struct DevicePtr<T>"));
        assert!(text.contains("pub fn launch_add(gx: u32"));
        assert!(text.contains("a0: &DevicePtr<f32>"));
        assert!(text.contains("a1: i32"));
        assert!(text.contains("join(\"add.ptx\")"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_runtime_is_deterministic() {
        let kernels = [add_kernel()];
        assert_eq!(render_runtime(&kernels), render_runtime(&kernels));
    }
}
