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


//! Integration tests for the passes of a frame and program compilation.

use prism_agents::Renderer;
use prism_core::asset::{Geometry, Material};
use prism_core::config::RendererConfig;
use prism_core::math::{LinearRgba, Mat4, Rect, Vec3};
use prism_core::memory::Handle;
use prism_core::renderer::light::DirectionalLight;
use prism_core::renderer::api::Side;
use prism_core::renderer::{LightDescriptor, LightState, LightType, ShadowDescriptor, ShaderError};
use prism_core::scene::{Camera, DrawableItem, OutputTarget, Scene};
use prism_infra::{HeadlessConfig, HeadlessDriver};
use std::collections::HashSet;

fn triangle(renderer: &mut Renderer<HeadlessDriver>) -> Handle<Geometry> {
    renderer.register_resource(Geometry::from_positions(vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0,
    ]))
}

fn sun() -> LightState {
    LightState {
        version: 1,
        ambient: LinearRgba::BLACK,
        lights: vec![LightDescriptor {
            light: LightType::Directional(DirectionalLight::default()),
            position: Vec3::new(0.0, 5.0, 0.0),
            shadow: Some(ShadowDescriptor::default()),
        }],
    }
}

/// Helper: a lit scene with a shadow-casting opaque object and a
/// double-sided transmissive object in front of it.
fn glass_scene(renderer: &mut Renderer<HeadlessDriver>) -> Scene {
    let geometry = triangle(renderer);
    let solid = renderer.register_resource(Material::standard(LinearRgba::rgb(0.5, 0.5, 0.5)));
    let mut glass = Material::physical(LinearRgba::WHITE);
    glass.transmission = 0.5;
    glass.side = Side::Double;
    let glass = renderer.register_resource(glass);

    let mut floor = DrawableItem::new(0, geometry, solid, Mat4::IDENTITY);
    floor.cast_shadow = true;
    floor.receive_shadow = true;
    let mut pane = DrawableItem::new(1, geometry, glass, Mat4::from_translation(Vec3::Z));
    pane.cast_shadow = true;

    let mut scene = Scene::default();
    scene.items.push(floor);
    scene.items.push(pane);
    scene.lights = sun();
    scene
}

fn shadowed_config() -> RendererConfig {
    let mut config = RendererConfig::default();
    config.shadow_map.enabled = true;
    config
}

#[test]
fn test_frame_runs_shadow_transmission_then_main_pass() {
    let driver = HeadlessDriver::default();
    let mut renderer = Renderer::new(driver.clone(), shadowed_config());
    renderer.set_size(64, 48);
    let scene = glass_scene(&mut renderer);

    renderer
        .render(&scene, &Camera::default(), OutputTarget::Screen)
        .unwrap();

    let draws = driver.draws();
    let first = draws.first().unwrap();
    assert!(first.framebuffer.is_some());
    assert_eq!(first.viewport, Rect::from_size(512, 512));

    let offscreen: HashSet<_> = draws.iter().filter_map(|d| d.framebuffer).collect();
    assert_eq!(offscreen.len(), 2, "one shadow map and one transmission target");

    let main: Vec<_> = draws.iter().filter(|d| d.framebuffer.is_none()).collect();
    assert_eq!(main.len(), 2);
    assert!(draws.last().unwrap().framebuffer.is_none());
    assert!(main[0].ints("directionalShadowMap").is_some());
    assert!(main[1].ints("transmissionSamplerMap").is_some());
    assert_eq!(renderer.info().draw_calls as usize, draws.len());
}

#[test]
fn test_transmissive_scene_reaches_steady_state_on_second_frame() {
    let driver = HeadlessDriver::default();
    let mut renderer = Renderer::new(driver.clone(), shadowed_config());
    renderer.set_size(64, 48);
    let scene = glass_scene(&mut renderer);
    let camera = Camera::default();

    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    let programs = driver.live_programs();
    driver.reset_log();
    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();

    assert_eq!(driver.count("create_program"), 0);
    assert_eq!(driver.count("delete_program"), 0);
    assert_eq!(driver.live_programs(), programs);
    assert_eq!(renderer.info().skipped_draws, 0);
}

#[test]
fn test_compile_prepares_every_program_the_frame_needs() {
    let driver = HeadlessDriver::default();
    let mut renderer = Renderer::new(driver.clone(), shadowed_config());
    renderer.set_size(64, 48);
    let scene = glass_scene(&mut renderer);
    let camera = Camera::default();

    let compiled = renderer.compile(&scene, &camera).unwrap();
    assert!(compiled > 0);
    assert_eq!(driver.count("create_program"), compiled);
    assert!(driver.draws().is_empty());

    renderer
        .render(&scene, &camera, OutputTarget::Screen)
        .unwrap();
    assert_eq!(driver.count("create_program"), compiled);
    assert_eq!(driver.count("delete_program"), 0);
    assert_eq!(renderer.info().skipped_draws, 0);
}

#[test]
fn test_async_programs_skip_draws_until_ready() {
    let mut headless = HeadlessConfig::default();
    headless.capabilities.parallel_shader_compile = true;
    headless.compile_latency_polls = 1;
    let driver = HeadlessDriver::new(headless);
    let mut config = RendererConfig::default();
    config.async_compile = true;
    let mut renderer = Renderer::new(driver.clone(), config);
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    scene
        .items
        .push(DrawableItem::new(0, geometry, material, Mat4::IDENTITY));
    let camera = Camera::default();

    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    assert_eq!(renderer.info().draw_calls, 0);
    assert_eq!(renderer.info().skipped_draws, 1);

    let mut frames = 1;
    while renderer.info().draw_calls == 0 && frames < 5 {
        renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
        frames += 1;
    }
    assert_eq!(renderer.info().draw_calls, 1);
    assert_eq!(renderer.info().skipped_draws, 0);
    assert_eq!(frames, 3);
    assert_eq!(driver.count("create_program"), 1);
}

#[test]
fn test_failed_program_skips_only_its_draws() {
    let driver = HeadlessDriver::default();
    let mut renderer = Renderer::new(driver.clone(), RendererConfig::default());
    let geometry = triangle(&mut renderer);
    let broken = renderer.register_resource(Material::custom(
        "in vec3 position;\nvoid main() { gl_Position = vec4(position, 1.0); }\n",
        "#error unsupported\nvoid main() {}\n",
    ));
    let fine = renderer.register_resource(Material::basic(LinearRgba::WHITE));
    let mut scene = Scene::default();
    scene
        .items
        .push(DrawableItem::new(0, geometry, broken, Mat4::IDENTITY));
    scene.items.push(DrawableItem::new(
        1,
        geometry,
        fine,
        Mat4::from_translation(Vec3::X),
    ));

    renderer
        .render(&scene, &Camera::default(), OutputTarget::Screen)
        .unwrap();
    assert_eq!(renderer.info().draw_calls, 1);
    assert_eq!(renderer.info().skipped_draws, 1);

    let diagnostics: Vec<&ShaderError> = renderer.program_diagnostics().collect();
    assert_eq!(diagnostics.len(), 1);
    match diagnostics[0] {
        ShaderError::CompilationFailed {
            log,
            fragment_source,
            ..
        } => {
            assert!(log.contains("#error"));
            assert!(fragment_source.contains("#error unsupported"));
        }
        other => panic!("unexpected diagnostic: {other}"),
    }

    // The failed entry is not compiled again on the next frame.
    renderer
        .render(&scene, &Camera::default(), OutputTarget::Screen)
        .unwrap();
    assert_eq!(driver.count("create_program"), 2);
}

#[test]
fn test_light_count_change_moves_material_to_a_new_program() {
    let driver = HeadlessDriver::default();
    let mut renderer = Renderer::new(driver.clone(), RendererConfig::default());
    let geometry = triangle(&mut renderer);
    let material = renderer.register_resource(Material::standard(LinearRgba::WHITE));
    let mut scene = Scene::default();
    scene
        .items
        .push(DrawableItem::new(0, geometry, material, Mat4::IDENTITY));
    scene.lights = sun();
    scene.lights.lights[0].shadow = None;
    let camera = Camera::default();

    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    let first = driver.draws()[0].program;

    // Same application version, different counts: the renderer must notice.
    scene.lights.lights.push(LightDescriptor::default());
    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    let second = driver.draws()[1].program;

    assert_ne!(first, second);
    assert_eq!(driver.count("create_program"), 2);
    // The old program lost its only user.
    assert_eq!(driver.live_programs(), 1);

    // Back to one light: the first signature compiles again from scratch.
    scene.lights.lights.pop();
    renderer.render(&scene, &camera, OutputTarget::Screen).unwrap();
    assert_eq!(driver.count("create_program"), 3);
    assert_eq!(driver.invalid_handle_uses(), 0);
}
