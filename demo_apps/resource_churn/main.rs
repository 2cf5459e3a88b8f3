//! Resource Churn Demo
//!
//! Spawns a dedicated render thread backed by the headless backend, then lets
//! several client threads create and drop buffers, shaders, programs and
//! transient render targets through the shared context.
//!
//! ```text
//! RUST_LOG=info cargo run -p resource_churn -- [clients] [rounds]
//! ```

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use ral::prelude::*;
use ral::TexturePoolStatus;
use ral_dev_utils::HeadlessBackend;

const TARGET_SIZES: [u32; 3] = [256, 512, 1024];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let clients: u32 = args.next().map(|a| a.parse()).transpose()?.unwrap_or(4);
    let rounds: u32 = args.next().map(|a| a.parse()).transpose()?.unwrap_or(200);

    let render = RenderThread::spawn("ral-render")?;
    let backend = HeadlessBackend::new();
    let journal = backend.journal();
    let ctx = ResourceContext::new(
        backend,
        Arc::clone(render.dispatcher()),
        ContextSettings::default(),
    );

    ctx.callbacks().subscribe(ContextEvent::ContextAboutToRelease, |_| {
        log::info!("Context is shutting down");
    });

    thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..clients)
            .map(|client| {
                let ctx = &ctx;
                scope.spawn(move || churn(ctx, client, rounds))
            })
            .collect();

        for (client, worker) in workers.into_iter().enumerate() {
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("client {client} panicked"))?
                .with_context(|| format!("client {client} failed"))?;
        }
        Ok(())
    })?;

    ctx.collect_texture_garbage();
    let status: TexturePoolStatus = ctx.texture_pool().dump_status();
    log::info!("Pool after churn: {status}");

    for kind in ObjectKind::ALL {
        log::info!(
            "{kind}: {} created, {} released by the backend",
            journal.created(kind),
            journal.released(kind)
        );
    }

    ctx.shutdown()?;
    render.shutdown();
    log::info!("Backend objects still alive: {}", journal.live_objects());
    Ok(())
}

fn churn(ctx: &ResourceContext<HeadlessBackend>, client: u32, rounds: u32) -> Result<()> {
    let shaders = ctx.create_objects(
        ObjectKind::Shader,
        &[
            ShaderCreateInfo::new(format!("client{client}.vs"), wgpu::ShaderStages::VERTEX, "vs")
                .into(),
            ShaderCreateInfo::new(format!("client{client}.fs"), wgpu::ShaderStages::FRAGMENT, "fs")
                .into(),
        ],
    )?;

    let mut program_info = ProgramCreateInfo::new(format!("client{client}.program"));
    program_info.shaders = shaders.to_vec();
    let program = ctx.create_objects(ObjectKind::Program, &[program_info.into()])?;
    let state = ctx.create_objects(
        ObjectKind::GfxState,
        &[GfxStateCreateInfo::new(program[0]).into()],
    )?;

    for round in 0..rounds {
        let buffers = ctx.create_objects(
            ObjectKind::Buffer,
            &[
                BufferCreateInfo::new(4096, wgpu::BufferUsages::VERTEX).into(),
                BufferCreateInfo::new(1024, wgpu::BufferUsages::INDEX).into(),
                BufferCreateInfo::new(256, wgpu::BufferUsages::UNIFORM).into(),
            ],
        )?;

        let size = TARGET_SIZES[(round as usize + client as usize) % TARGET_SIZES.len()];
        let targets = ctx.create_objects(
            ObjectKind::Texture,
            &[
                TextureCreateInfo::new(TextureDescriptor::new_2d(
                    size,
                    size,
                    wgpu::TextureFormat::Rgba16Float,
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                ))
                .into(),
                TextureCreateInfo::new(TextureDescriptor::new_2d(
                    size,
                    size,
                    wgpu::TextureFormat::Depth32Float,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                ))
                .into(),
            ],
        )?;
        let views = ctx.create_objects(
            ObjectKind::TextureView,
            &[TextureViewCreateInfo::whole(targets[0]).into()],
        )?;

        ctx.delete_objects(ObjectKind::TextureView, &views)?;
        ctx.delete_objects(ObjectKind::Texture, &targets)?;
        ctx.delete_objects(ObjectKind::Buffer, &buffers)?;
    }

    ctx.delete_objects(ObjectKind::GfxState, &state)?;
    ctx.delete_objects(ObjectKind::Program, &program)?;
    ctx.delete_objects(ObjectKind::Shader, &shaders)?;
    log::debug!("Client {client} finished {rounds} rounds");
    Ok(())
}
