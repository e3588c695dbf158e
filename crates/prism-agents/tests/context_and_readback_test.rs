// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Integration tests for context loss and asynchronous pixel read-back.

use prism_agents::{ReadbackError, Renderer};
use prism_core::asset::{Geometry, ImageData, Material, RenderTarget, Texture};
use prism_core::config::RendererConfig;
use prism_core::math::{LinearRgba, Mat4, Rect};
use prism_core::renderer::api::RenderTargetDescriptor;
use prism_core::renderer::RenderError;
use prism_core::scene::{Camera, DrawableItem, OutputTarget, Scene};
use prism_infra::HeadlessDriver;

/// Helper: a renderer with one textured triangle in its scene.
fn textured_setup(driver: &HeadlessDriver) -> (Renderer<HeadlessDriver>, Scene) {
    let mut renderer = Renderer::new(driver.clone(), RendererConfig::default());
    renderer.set_size(4, 4);
    let geometry = renderer.register_resource(Geometry::from_positions(vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0,
    ]));
    let image = renderer.register_resource(ImageData::white());
    let texture = renderer.register_resource(Texture::new(image));
    let mut material = Material::basic(LinearRgba::WHITE);
    material.maps.map = Some(texture);
    let material = renderer.register_resource(material);
    let mut scene = Scene::default();
    scene
        .items
        .push(DrawableItem::new(0, geometry, material, Mat4::IDENTITY));
    (renderer, scene)
}

fn render(renderer: &mut Renderer<HeadlessDriver>, scene: &Scene) -> Result<(), RenderError> {
    renderer.render(scene, &Camera::default(), OutputTarget::Screen)
}

// ─────────────────────────────────────────────────────────────────────────────
// Context loss
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_lost_context_fails_frames_until_restored_then_rebuilds() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    render(&mut renderer, &scene).unwrap();
    let programs = renderer.info().programs;
    let textures = renderer.info().textures;
    assert!(textures > 0);

    driver.lose_context();
    assert_eq!(render(&mut renderer, &scene), Err(RenderError::ContextLost));
    assert!(renderer.is_context_lost());
    assert_eq!(renderer.info().programs, 0);
    assert_eq!(renderer.info().textures, 0);
    assert_eq!(renderer.info().geometries, 0);
    assert_eq!(render(&mut renderer, &scene), Err(RenderError::ContextLost));

    driver.restore_context();
    driver.reset_log();
    render(&mut renderer, &scene).unwrap();
    assert!(!renderer.is_context_lost());
    assert_eq!(driver.count("create_program"), 1);
    assert!(driver.count("create_texture") > 0);
    assert!(driver.count("create_buffer") > 0);
    assert_eq!(driver.draws().len(), 1);
    assert_eq!(renderer.info().programs, programs);
    assert_eq!(renderer.info().textures, textures);
    assert_eq!(driver.invalid_handle_uses(), 0);
    // Logical resources survive the loss.
    assert_eq!(renderer.resource_counts().materials, 1);
}

#[test]
fn test_notified_loss_drops_caches_without_driver_calls() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    render(&mut renderer, &scene).unwrap();

    driver.reset_log();
    renderer.notify_context_lost();
    assert!(driver.calls().is_empty());
    assert!(renderer.is_context_lost());

    // The driver never lost anything, so the next frame resumes at once.
    render(&mut renderer, &scene).unwrap();
    assert!(!renderer.is_context_lost());
    assert_eq!(driver.draws().len(), 1);
}

#[test]
fn test_resources_disposed_while_lost_are_forgotten() {
    let driver = HeadlessDriver::default();
    let (mut renderer, mut scene) = textured_setup(&driver);
    render(&mut renderer, &scene).unwrap();
    let material = scene.items[0].material;

    driver.lose_context();
    renderer.notify_context_lost();
    scene.items.clear();
    renderer.dispose_resource(material).unwrap();
    driver.restore_context();
    renderer.notify_context_restored();

    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.live_programs(), 0);
    assert_eq!(driver.invalid_handle_uses(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Read-back
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_screen_readback_resolves_after_polling() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    renderer.config_mut().clear_color = LinearRgba::new(0.0, 1.0, 0.0, 1.0);
    driver.set_default_framebuffer_color(LinearRgba::new(0.0, 1.0, 0.0, 1.0));
    render(&mut renderer, &scene).unwrap();

    let mut readback = renderer
        .read_pixels_async(Rect::new(1, 1, 2, 1), OutputTarget::Screen)
        .unwrap();
    assert!(!readback.is_ready());
    assert_eq!(renderer.pending_readbacks(), 1);

    while renderer.pending_readbacks() > 0 {
        renderer.poll_readbacks();
    }
    assert!(readback.is_ready());
    let pixels = readback.try_take().unwrap().unwrap();
    assert_eq!(pixels, vec![0, 255, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn test_readback_future_resolves_on_the_next_frames() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    render(&mut renderer, &scene).unwrap();

    let readback = renderer
        .read_pixels_async(Rect::from_size(4, 4), OutputTarget::Screen)
        .unwrap();
    // Frames poll read-backs when they end.
    render(&mut renderer, &scene).unwrap();
    render(&mut renderer, &scene).unwrap();

    let pixels = pollster::block_on(readback).unwrap();
    assert_eq!(pixels.len(), 4 * 4 * 4);
    assert_eq!(driver.live_buffers(), 1, "only the triangle's position buffer remains");
}

#[test]
fn test_render_target_readback_uses_its_framebuffer() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    renderer.config_mut().clear_color = LinearRgba::new(1.0, 0.0, 0.0, 1.0);
    let target = renderer.register_resource(RenderTarget::new(RenderTargetDescriptor::color_depth(
        8, 8,
    )));
    renderer
        .render(&scene, &Camera::default(), OutputTarget::RenderTarget(target))
        .unwrap();

    let readback = renderer
        .read_pixels_async(Rect::new(0, 0, 1, 1), OutputTarget::RenderTarget(target))
        .unwrap();
    renderer.poll_readbacks();
    renderer.poll_readbacks();
    assert_eq!(pollster::block_on(readback), Ok(vec![255, 0, 0, 255]));
}

#[test]
fn test_readback_outside_target_is_rejected() {
    let driver = HeadlessDriver::default();
    let (mut renderer, _) = textured_setup(&driver);
    let err = renderer
        .read_pixels_async(Rect::new(3, 0, 2, 2), OutputTarget::Screen)
        .unwrap_err();
    assert_eq!(
        err,
        ReadbackError::OutOfBounds {
            rect: Rect::new(3, 0, 2, 2),
            width: 4,
            height: 4,
        }
    );
    assert_eq!(driver.count("create_buffer"), 0);
}

#[test]
fn test_readback_rect_overflowing_i32_is_rejected() {
    let driver = HeadlessDriver::default();
    let (mut renderer, _) = textured_setup(&driver);
    for rect in [Rect::new(i32::MAX, 0, 1, 1), Rect::new(0, 2, 1, i32::MAX)] {
        assert!(matches!(
            renderer.read_pixels_async(rect, OutputTarget::Screen),
            Err(ReadbackError::OutOfBounds { .. })
        ));
    }
    assert_eq!(driver.count("create_buffer"), 0);
}

#[test]
fn test_context_loss_fails_pending_readbacks() {
    let driver = HeadlessDriver::default();
    let (mut renderer, scene) = textured_setup(&driver);
    render(&mut renderer, &scene).unwrap();
    let readback = renderer
        .read_pixels_async(Rect::from_size(1, 1), OutputTarget::Screen)
        .unwrap();

    driver.lose_context();
    assert_eq!(render(&mut renderer, &scene), Err(RenderError::ContextLost));
    assert_eq!(pollster::block_on(readback), Err(ReadbackError::ContextLost));
    assert_eq!(
        renderer
            .read_pixels_async(Rect::from_size(1, 1), OutputTarget::Screen)
            .err(),
        Some(ReadbackError::ContextLost)
    );
}

#[test]
fn test_dropping_the_renderer_cancels_pending_readbacks() {
    let driver = HeadlessDriver::default();
    let (mut renderer, _) = textured_setup(&driver);
    let readback = renderer
        .read_pixels_async(Rect::from_size(1, 1), OutputTarget::Screen)
        .unwrap();
    drop(renderer);
    assert_eq!(pollster::block_on(readback), Err(ReadbackError::Cancelled));
}
