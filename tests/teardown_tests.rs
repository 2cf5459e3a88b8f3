//! Teardown Tests
//!
//! Tests for:
//! - Leak detection on explicit shutdown
//! - Drop-time teardown under each LeakPolicy
//! - Pool draining before release

use std::sync::Arc;

use parking_lot::Mutex;
use ral::prelude::*;
use ral::LeakReport;
use ral_dev_utils::{HeadlessBackend, Journal};

fn context_with(settings: ContextSettings) -> (ResourceContext<HeadlessBackend>, Journal) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = HeadlessBackend::new();
    let journal = backend.journal();
    let ctx = ResourceContext::new(backend, Arc::new(Dispatcher::new()), settings);
    (ctx, journal)
}

fn texture_info() -> CreateInfo {
    TextureCreateInfo::new(TextureDescriptor::new_2d(
        32,
        32,
        wgpu::TextureFormat::Depth32Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT,
    ))
    .into()
}

#[test]
fn clean_shutdown_reports_no_leaks() {
    let (ctx, journal) = context_with(ContextSettings::default());
    let h = ctx.create_objects(ObjectKind::Texture, &[texture_info()]).unwrap();
    ctx.delete_objects(ObjectKind::Texture, &h).unwrap();

    ctx.shutdown().unwrap();
    assert_eq!(journal.released(ObjectKind::Texture), 1);
    assert_eq!(journal.live_objects(), 0);
}

#[test]
fn shutdown_reports_and_releases_leaks() {
    let (ctx, journal) = context_with(ContextSettings::default());
    let buffers = ctx
        .create_objects(
            ObjectKind::Buffer,
            &[
                BufferCreateInfo::new(4, wgpu::BufferUsages::STORAGE).into(),
                BufferCreateInfo::new(4, wgpu::BufferUsages::STORAGE).into(),
            ],
        )
        .unwrap();
    ctx.create_objects(ObjectKind::Texture, &[texture_info()]).unwrap();
    ctx.delete_objects(ObjectKind::Buffer, &buffers[..1]).unwrap();

    let err = ctx.shutdown().unwrap_err();
    match err {
        RalError::LeakDetected(leaks) => assert_eq!(
            leaks,
            vec![
                LeakReport { kind: ObjectKind::Buffer, live_objects: 1 },
                LeakReport { kind: ObjectKind::Texture, live_objects: 1 },
            ]
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(journal.live_objects(), 0);
}

#[test]
fn teardown_announces_itself_before_draining_the_pool() {
    let (ctx, _journal) = context_with(ContextSettings::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    for event in [ContextEvent::ContextAboutToRelease, ContextEvent::Deleted(ObjectKind::Texture)] {
        let log = Arc::clone(&log);
        ctx.callbacks().subscribe(event, move |payload| log.lock().push(payload.event));
    }

    let h = ctx.create_objects(ObjectKind::Texture, &[texture_info()]).unwrap();
    ctx.delete_objects(ObjectKind::Texture, &h).unwrap();
    let pool = Arc::clone(ctx.texture_pool());
    ctx.shutdown().unwrap();

    assert_eq!(
        *log.lock(),
        vec![ContextEvent::ContextAboutToRelease, ContextEvent::Deleted(ObjectKind::Texture)]
    );
    assert!(pool.is_draining());
    assert!(!pool.is_attached());
}

#[test]
fn drop_with_warn_policy_releases_quietly() {
    let (ctx, journal) = context_with(ContextSettings {
        leak_policy: LeakPolicy::Warn,
        ..Default::default()
    });
    ctx.create_objects(ObjectKind::Sampler, &[SamplerCreateInfo::default().into()]).unwrap();

    drop(ctx);
    assert_eq!(journal.released(ObjectKind::Sampler), 1);
    assert_eq!(journal.live_objects(), 0);
}

#[test]
#[should_panic(expected = "Leak detected")]
fn drop_with_panic_policy_panics_on_leak() {
    let (ctx, _journal) = context_with(ContextSettings {
        leak_policy: LeakPolicy::Panic,
        ..Default::default()
    });
    ctx.create_objects(ObjectKind::CommandBuffer, &[CommandBufferCreateInfo::default().into()])
        .unwrap();
    drop(ctx);
}

#[test]
fn drop_without_leaks_is_silent_under_any_policy() {
    let (ctx, journal) = context_with(ContextSettings {
        leak_policy: LeakPolicy::Panic,
        ..Default::default()
    });
    let h = ctx
        .create_objects(ObjectKind::Program, &[ProgramCreateInfo::new("unlit").into()])
        .unwrap();
    ctx.delete_objects(ObjectKind::Program, &h).unwrap();

    drop(ctx);
    assert_eq!(journal.live_objects(), 0);
}
