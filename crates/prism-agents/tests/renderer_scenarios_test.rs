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


//! End-to-end frame scenarios through the Renderer and the headless driver.
//!
//! Every property here is checked by counting driver calls or by inspecting
//! the draw snapshots the headless driver records.

use prism_agents::{FramePhase, Renderer};
use prism_core::asset::{Geometry, Material, RenderTarget};
use prism_core::config::{AutoClear, RendererConfig};
use prism_core::math::{LinearRgba, Mat4, Rect, Vec3};
use prism_core::memory::Handle;
use prism_core::renderer::api::RenderTargetDescriptor;
use prism_core::renderer::RenderError;
use prism_core::scene::{Camera, DrawableItem, OutputTarget, Scene};
use prism_infra::HeadlessDriver;

/// Helper: a renderer sharing its recorded state with `driver`.
fn renderer(driver: &HeadlessDriver) -> Renderer<HeadlessDriver> {
    let mut renderer = Renderer::new(driver.clone(), RendererConfig::default());
    renderer.set_size(64, 48);
    renderer
}

fn triangle(renderer: &mut Renderer<HeadlessDriver>) -> Handle<Geometry> {
    renderer.register_resource(Geometry::from_positions(vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0,
    ]))
}

fn item(id: u64, geometry: Handle<Geometry>, material: Handle<Material>, at: Vec3) -> DrawableItem {
    DrawableItem::new(id, geometry, material, Mat4::from_translation(at))
}

fn transparent(color: LinearRgba) -> Material {
    let mut material = Material::basic(color);
    material.transparent = true;
    material.opacity = 0.5;
    material
}

fn render(renderer: &mut Renderer<HeadlessDriver>, scene: &Scene) -> Result<(), RenderError> {
    renderer.render(scene, &Camera::default(), OutputTarget::Screen)
}

// ─────────────────────────────────────────────────────────────────────────────
// Sharing and ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_hundred_items_sharing_a_material_compile_and_bind_once() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    for i in 0..100 {
        let at = Vec3::new((i % 10) as f32 * 0.1, (i / 10) as f32 * 0.1, -(i as f32) * 0.01);
        scene.items.push(item(i, geometry, material, at));
    }

    render(&mut renderer, &scene).unwrap();

    assert_eq!(driver.count("create_program"), 1);
    assert_eq!(driver.count("use_program"), 1);
    assert_eq!(driver.draws().len(), 100);
    assert_eq!(renderer.info().draw_calls, 100);
    assert_eq!(renderer.info().programs, 1);
}

#[test]
fn test_transparent_items_draw_after_opaque_far_to_near() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let near = renderer.register_resource(transparent(LinearRgba::rgb(0.0, 0.0, 1.0)));
    let solid = renderer.register_resource(Material::basic(LinearRgba::rgb(1.0, 0.0, 0.0)));
    let far = renderer.register_resource(transparent(LinearRgba::rgb(0.0, 1.0, 0.0)));
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, near, Vec3::new(0.0, 0.0, 2.0)));
    scene.items.push(item(1, geometry, solid, Vec3::ZERO));
    scene.items.push(item(2, geometry, far, Vec3::new(0.0, 0.0, -2.0)));

    render(&mut renderer, &scene).unwrap();

    let draws = driver.draws();
    let colors: Vec<&[f32]> = draws.iter().filter_map(|d| d.floats("diffuse")).collect();
    assert_eq!(
        colors,
        vec![&[1.0, 0.0, 0.0][..], &[0.0, 1.0, 0.0][..], &[0.0, 0.0, 1.0][..]]
    );
    assert!(!draws[0].blending);
    assert!(draws[1].blending && draws[2].blending);
}

#[test]
fn test_equal_sort_keys_keep_insertion_order_across_frames() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    for i in 0..5 {
        scene
            .items
            .push(item(i, geometry, material, Vec3::new(i as f32, 0.0, 0.0)));
    }

    for _ in 0..2 {
        driver.reset_log();
        render(&mut renderer, &scene).unwrap();
        let xs: Vec<f32> = driver
            .draws()
            .iter()
            .filter_map(|d| d.floats("modelMatrix").map(|m| m[12]))
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Redundant work
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unchanged_frame_uploads_nothing_and_changed_color_uploads_once() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    renderer.config_mut().auto_clear = AutoClear {
        color: false,
        depth: false,
        stencil: false,
    };
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, material, Vec3::ZERO));

    render(&mut renderer, &scene).unwrap();
    driver.reset_log();
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("draw_arrays"), 1);
    assert_eq!(driver.count("uniform_f32"), 0);
    assert_eq!(driver.count("use_program"), 0);
    assert_eq!(driver.count("buffer_data"), 0);

    renderer
        .update_resource(material, |m| m.color = LinearRgba::rgb(0.5, 0.5, 0.5))
        .unwrap();
    driver.reset_log();
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 0);
    assert_eq!(driver.count("uniform_f32"), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Program lifetime
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_disposing_last_material_evicts_and_next_material_recompiles() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let first = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, first, Vec3::ZERO));
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.live_programs(), 1);

    scene.items.clear();
    renderer.dispose_resource(first).unwrap();
    assert_eq!(driver.live_programs(), 0);
    assert_eq!(renderer.info().programs, 0);
    assert_eq!(
        renderer.dispose_resource(first).err(),
        Some(RenderError::InvalidHandle { kind: "material" })
    );

    let second = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    scene.items.push(item(0, geometry, second, Vec3::ZERO));
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 2);
    assert_eq!(driver.live_programs(), 1);
    assert_eq!(driver.invalid_handle_uses(), 0);
}

#[test]
fn test_program_survives_while_another_material_uses_it() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let a = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let b = renderer.register_resource(Material::basic(LinearRgba::BLACK));
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, a, Vec3::ZERO));
    scene.items.push(item(1, geometry, b, Vec3::X));
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 1);

    scene.items.remove(0);
    renderer.dispose_resource(a).unwrap();
    assert_eq!(driver.live_programs(), 1);
    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 1);
}

#[test]
fn test_skinned_and_static_uses_of_one_material_get_separate_programs() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut skinned = item(1, geometry, material, Vec3::X);
    skinned.features.skinning = true;
    skinned.features.bone_count = 2;
    skinned.bone_matrices = vec![Mat4::IDENTITY; 2];
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, material, Vec3::ZERO));
    scene.items.push(skinned);

    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 2);
    assert_eq!(driver.draws().len(), 2);

    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.count("create_program"), 2);

    scene.items.clear();
    renderer.dispose_resource(material).unwrap();
    assert_eq!(driver.live_programs(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Targets and frame state
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_render_target_is_created_once_and_recreated_on_resize() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let target = renderer.register_resource(RenderTarget::new(RenderTargetDescriptor::color_depth(
        32, 32,
    )));
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, material, Vec3::ZERO));
    let camera = Camera::default();

    renderer
        .render(&scene, &camera, OutputTarget::RenderTarget(target))
        .unwrap();
    renderer
        .render(&scene, &camera, OutputTarget::RenderTarget(target))
        .unwrap();
    assert_eq!(driver.count("create_render_target"), 1);
    let draws = driver.draws();
    assert!(draws.iter().all(|d| d.framebuffer.is_some()));
    assert_eq!(draws[0].viewport, Rect::from_size(32, 32));

    renderer
        .update_resource(target, |t| t.set_size(16, 16))
        .unwrap();
    renderer
        .render(&scene, &camera, OutputTarget::RenderTarget(target))
        .unwrap();
    assert_eq!(driver.count("create_render_target"), 2);
    assert_eq!(driver.count("delete_render_target"), 1);
}

#[test]
fn test_failed_frame_returns_to_idle() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let target = renderer.register_resource(RenderTarget::new(RenderTargetDescriptor::color_depth(
        8, 8,
    )));
    renderer.dispose_resource(target).unwrap();
    let scene = Scene::default();

    let result = renderer.render(&scene, &Camera::default(), OutputTarget::RenderTarget(target));
    assert_eq!(
        result,
        Err(RenderError::InvalidHandle {
            kind: "render target"
        })
    );
    assert_eq!(renderer.phase(), FramePhase::Idle);
    assert!(render(&mut renderer, &scene).is_ok());
    assert_eq!(renderer.info().frame, 2);
}

#[test]
fn test_hidden_items_and_materials_are_not_drawn() {
    let driver = HeadlessDriver::default();
    let mut renderer = renderer(&driver);
    let geometry = triangle(&mut renderer);
    let shown = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut hidden_material = Material::basic(LinearRgba::WHITE);
    hidden_material.visible = false;
    let hidden_material = renderer.register_resource(hidden_material);
    let mut scene = Scene::default();
    scene.items.push(item(0, geometry, shown, Vec3::ZERO));
    let mut hidden = item(1, geometry, shown, Vec3::X);
    hidden.visible = false;
    scene.items.push(hidden);
    scene.items.push(item(2, geometry, hidden_material, Vec3::Y));

    render(&mut renderer, &scene).unwrap();
    assert_eq!(driver.draws().len(), 1);
}
