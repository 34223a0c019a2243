//! End-to-end tests over a real wasm instance: a wat guest imports a mix of
//! bridge functions, and every scenario here is deterministic without any
//! GPU present (adapter enumeration itself is allowed to fail).

use wasmtime::{Engine, Linker, Module, Store, Val};
use webgpu_bridge_wasmtime::{
    add_to_linker, set_callback_webgpu, status, WebGpuCtx, WebGpuView,
};

struct Host {
    webgpu: WebGpuCtx,
}

impl WebGpuView for Host {
    fn webgpu(&mut self) -> &mut WebGpuCtx {
        &mut self.webgpu
    }
}

const GUEST: &str = r#"
(module
  (import "env" "wgpuCreateInstance" (func $create_instance (result i32)))
  (import "env" "wgpuInstanceRelease" (func $instance_release (param i32) (result i32)))
  (import "env" "wgpuInstanceRequestAdapter" (func $request_adapter (param i32 i32) (result i32)))
  (import "env" "wgpuAdapterGetLimits" (func $adapter_get_limits (param i32 i32) (result i32)))
  (import "env" "wgpuDeviceCreateBuffer" (func $create_buffer (param i32 i32) (result i32)))
  (import "env" "wgpuGetLastErrorCode" (func $last_error_code (result i32)))
  (import "env" "wgpuGetLastErrorMessage" (func $last_error_message (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "create_instance") (result i32) (call $create_instance))
  (func (export "instance_release") (param i32) (result i32)
    (call $instance_release (local.get 0)))
  (func (export "request_adapter") (param i32 i32) (result i32)
    (call $request_adapter (local.get 0) (local.get 1)))
  (func (export "adapter_get_limits") (param i32 i32) (result i32)
    (call $adapter_get_limits (local.get 0) (local.get 1)))
  (func (export "create_buffer") (param i32 i32) (result i32)
    (call $create_buffer (local.get 0) (local.get 1)))
  (func (export "last_error_code") (result i32) (call $last_error_code))
  (func (export "last_error_message") (param i32 i32) (result i32)
    (call $last_error_message (local.get 0) (local.get 1)))
)
"#;

fn instantiate() -> (Store<Host>, wasmtime::Instance) {
    let engine = Engine::default();
    let module = Module::new(&engine, GUEST).unwrap();
    let mut store = Store::new(
        &engine,
        Host {
            webgpu: WebGpuCtx::new(),
        },
    );
    let mut linker = Linker::new(&engine);
    add_to_linker(&mut linker).unwrap();
    let instance = linker.instantiate(&mut store, &module).unwrap();
    (store, instance)
}

fn call1(store: &mut Store<Host>, instance: &wasmtime::Instance, name: &str, arg: u32) -> u32 {
    let func = instance
        .get_typed_func::<i32, i32>(&mut *store, name)
        .unwrap();
    func.call(store, arg as i32).unwrap() as u32
}

fn call2(
    store: &mut Store<Host>,
    instance: &wasmtime::Instance,
    name: &str,
    a: u32,
    b: u32,
) -> u32 {
    let func = instance
        .get_typed_func::<(i32, i32), i32>(&mut *store, name)
        .unwrap();
    func.call(store, (a as i32, b as i32)).unwrap() as u32
}

#[test]
fn create_instance_returns_a_nonzero_handle() {
    let (mut store, instance) = instantiate();
    let func = instance
        .get_typed_func::<(), i32>(&mut store, "create_instance")
        .unwrap();
    let handle = func.call(&mut store, ()).unwrap();
    assert_ne!(handle, 0);
}

#[test]
fn out_of_bounds_descriptor_is_reported_not_trapped() {
    let (mut store, instance) = instantiate();
    let func = instance
        .get_typed_func::<(), i32>(&mut store, "create_instance")
        .unwrap();
    let handle = func.call(&mut store, ()).unwrap() as u32;

    // One page of memory; the options pointer lands far past it.
    let adapter = call2(&mut store, &instance, "request_adapter", handle, 0x10_0000);
    assert_eq!(adapter, 0);

    let code_func = instance
        .get_typed_func::<(), i32>(&mut store, "last_error_code")
        .unwrap();
    assert_eq!(code_func.call(&mut store, ()).unwrap() as u32, status::OUT_OF_BOUNDS);
}

#[test]
fn invalid_handles_are_reported() {
    let (mut store, instance) = instantiate();
    let buffer = call2(&mut store, &instance, "create_buffer", 42, 0);
    assert_eq!(buffer, 0);

    let code_func = instance
        .get_typed_func::<(), i32>(&mut store, "last_error_code")
        .unwrap();
    assert_eq!(code_func.call(&mut store, ()).unwrap() as u32, status::INVALID_HANDLE);
}

#[test]
fn category_mismatch_is_reported() {
    let (mut store, instance) = instantiate();
    let func = instance
        .get_typed_func::<(), i32>(&mut store, "create_instance")
        .unwrap();
    let handle = func.call(&mut store, ()).unwrap() as u32;

    // An instance handle where an adapter is expected.
    let code = call2(&mut store, &instance, "adapter_get_limits", handle, 64);
    assert_eq!(code, status::WRONG_HANDLE_KIND);
}

#[test]
fn double_release_is_benign() {
    let (mut store, instance) = instantiate();
    let func = instance
        .get_typed_func::<(), i32>(&mut store, "create_instance")
        .unwrap();
    let handle = func.call(&mut store, ()).unwrap() as u32;

    assert_eq!(
        call1(&mut store, &instance, "instance_release", handle),
        status::SUCCESS
    );
    assert_eq!(
        call1(&mut store, &instance, "instance_release", handle),
        status::ALREADY_RELEASED
    );
    // The instance keeps working after the double free.
    let again = func.call(&mut store, ()).unwrap();
    assert_ne!(again, 0);
}

#[test]
fn error_messages_are_readable_from_the_guest() {
    let (mut store, instance) = instantiate();
    let buffer = call2(&mut store, &instance, "create_buffer", 42, 0);
    assert_eq!(buffer, 0);

    let written = call2(&mut store, &instance, "last_error_message", 16, 128);
    assert!(written > 0);
    let memory = instance.get_memory(&mut store, "memory").unwrap();
    let bytes = &memory.data(&store)[16..16 + written as usize];
    let message = std::str::from_utf8(bytes).unwrap();
    assert!(message.contains("42"), "unexpected message: {message}");
}

#[test]
fn truncated_error_messages_report_the_written_length() {
    let (mut store, instance) = instantiate();
    call2(&mut store, &instance, "create_buffer", 42, 0);
    let written = call2(&mut store, &instance, "last_error_message", 16, 4);
    assert_eq!(written, 4);
}

/// The embedder decides what to do with imports the bridge does not
/// provide; linking is driven per-import, the way a host engine would.
#[test]
fn unresolved_imports_are_the_embedders_choice() {
    const MIXED: &str = r#"
    (module
      (import "env" "wgpuCreateInstance" (func $create_instance (result i32)))
      (import "env" "wgpuNonExistentFn" (func $other (param i32) (result i32)))
      (memory (export "memory") 1)
      (func (export "run") (result i32)
        (drop (call $other (i32.const 7)))
        (call $create_instance))
    )
    "#;

    let engine = Engine::default();
    let module = Module::new(&engine, MIXED).unwrap();
    let mut store = Store::new(
        &engine,
        Host {
            webgpu: WebGpuCtx::new(),
        },
    );
    let mut linker: Linker<Host> = Linker::new(&engine);

    let mut unresolved = 0;
    for import in module.imports() {
        match set_callback_webgpu(import.module().as_bytes(), import.name().as_bytes()) {
            Some(entry) => {
                webgpu_bridge_wasmtime::define_on_linker(&mut linker, entry).unwrap();
            }
            None => {
                // This embedder stubs unknown imports with a zero return.
                unresolved += 1;
                let ty = import.ty();
                if let wasmtime::ExternType::Func(func_ty) = ty {
                    linker
                        .func_new(import.module(), import.name(), func_ty, |_, _, results| {
                            for slot in results.iter_mut() {
                                *slot = Val::I32(0);
                            }
                            Ok(())
                        })
                        .unwrap();
                }
            }
        }
    }
    assert_eq!(unresolved, 1);

    let instance = linker.instantiate(&mut store, &module).unwrap();
    let run = instance.get_typed_func::<(), i32>(&mut store, "run").unwrap();
    assert_ne!(run.call(&mut store, ()).unwrap(), 0);
}

/// `DispatchEntry::bind` produces a callable function with the table's
/// declared signature.
#[test]
fn dispatch_entries_bind_with_their_signature() {
    let engine = Engine::default();
    let mut store = Store::new(
        &engine,
        Host {
            webgpu: WebGpuCtx::new(),
        },
    );
    let entry = set_callback_webgpu(b"env", b"wgpuQueueWriteBuffer").unwrap();
    let func = entry.bind(&mut store);
    let ty = func.ty(&store);
    assert_eq!(ty.params().len(), 5);
    assert_eq!(ty.results().len(), 1);
}
