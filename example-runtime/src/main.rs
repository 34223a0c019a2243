//! A minimal embedding host: loads a core wasm module, resolves its imports
//! through the bridge one by one (the way an engine integration would), and
//! runs the guest's entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use wasmtime::{Engine, Linker, Module, Store};
use webgpu_bridge_wasmtime::{define_on_linker, set_callback_webgpu, WebGpuCtx, WebGpuView};

#[derive(clap::Parser, Debug)]
struct RuntimeArgs {
    /// Path to a core wasm module
    module: PathBuf,

    /// Exported function to invoke
    #[arg(long, default_value = "main")]
    invoke: String,
}

struct HostState {
    webgpu: WebGpuCtx,
}

impl WebGpuView for HostState {
    fn webgpu(&mut self) -> &mut WebGpuCtx {
        &mut self.webgpu
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = RuntimeArgs::parse();

    let engine = Engine::default();
    let module = Module::from_file(&engine, &args.module)
        .with_context(|| format!("failed to load {}", args.module.display()))?;
    let mut store = Store::new(
        &engine,
        HostState {
            webgpu: WebGpuCtx::new(),
        },
    );
    let mut linker: Linker<HostState> = Linker::new(&engine);

    for import in module.imports() {
        match set_callback_webgpu(import.module().as_bytes(), import.name().as_bytes()) {
            Some(entry) => {
                log::debug!("resolved import {}/{}", entry.module, entry.name);
                define_on_linker(&mut linker, entry)?;
            }
            None => {
                // Not ours; instantiation reports it if nothing else
                // provides the import either.
                log::debug!(
                    "import {}/{} not provided by the bridge",
                    import.module(),
                    import.name(),
                );
            }
        }
    }

    let instance = linker
        .instantiate(&mut store, &module)
        .context("failed to instantiate the guest")?;
    let entry_point = instance
        .get_typed_func::<(), ()>(&mut store, &args.invoke)
        .with_context(|| format!("guest does not export `{}`", args.invoke))?;
    entry_point.call(&mut store, ())?;

    if let Some(message) = store.data().webgpu.last_error_message() {
        log::info!("guest finished; last recorded error: {message}");
    }
    Ok(())
}
