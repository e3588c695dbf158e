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


// Prism sandbox
// Renders a small lit scene on the headless driver and reads the result back.

use anyhow::{Context, Result};
use prism_agents::Renderer;
use prism_core::asset::{Geometry, Indices, Material};
use prism_core::config::RendererConfig;
use prism_core::math::{LinearRgba, Mat4, Rect, Vec3};
use prism_core::renderer::api::Side;
use prism_core::renderer::light::DirectionalLight;
use prism_core::renderer::{GpuDriver, LightDescriptor, LightState, LightType, ShadowDescriptor};
use prism_core::scene::{Camera, DrawableItem, OutputTarget, Scene};
use prism_infra::{HeadlessConfig, HeadlessDriver};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FRAMES: u32 = 4;

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => RendererConfig::from_ron_file(&path)
            .with_context(|| format!("loading renderer config from '{path}'")),
        None => {
            log::info!("No config path given, using defaults");
            Ok(RendererConfig::default())
        }
    }
}

fn quad() -> Geometry {
    let mut geometry = Geometry::from_positions(vec![
        -1.0, 0.0, -1.0, //
        1.0, 0.0, -1.0, //
        1.0, 0.0, 1.0, //
        -1.0, 0.0, 1.0,
    ]);
    geometry.set_index(Indices::U16(vec![0, 2, 1, 0, 3, 2]));
    geometry
}

fn build_scene(renderer: &mut Renderer<HeadlessDriver>) -> Scene {
    let geometry = renderer.register_resource(quad());

    let floor_material = renderer.register_resource(Material::standard(LinearRgba::rgb(0.6, 0.6, 0.6)));
    let mut glass = Material::physical(LinearRgba::WHITE);
    glass.transmission = 0.9;
    glass.side = Side::Double;
    let glass = renderer.register_resource(glass);
    let mut smoke = Material::basic(LinearRgba::new(0.2, 0.2, 0.2, 0.4));
    smoke.transparent = true;
    let smoke = renderer.register_resource(smoke);

    let mut floor = DrawableItem::new(0, geometry, floor_material, Mat4::from_scale(Vec3::splat(4.0)));
    floor.receive_shadow = true;
    let mut pane = DrawableItem::new(
        1,
        geometry,
        glass,
        Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)) * Mat4::from_rotation_x(1.2),
    );
    pane.cast_shadow = true;
    let cloud = DrawableItem::new(2, geometry, smoke, Mat4::from_translation(Vec3::new(0.5, 2.0, 0.5)));

    let mut scene = Scene::default();
    scene.items.extend([floor, pane, cloud]);
    scene.lights = LightState {
        version: 1,
        ambient: LinearRgba::rgb(0.05, 0.05, 0.05),
        lights: vec![LightDescriptor {
            light: LightType::Directional(DirectionalLight::default()),
            position: Vec3::new(3.0, 6.0, 2.0),
            shadow: Some(ShadowDescriptor::default()),
        }],
    };
    scene
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = load_config()?;
    let driver = HeadlessDriver::new(HeadlessConfig::default());
    let mut renderer = Renderer::new(driver.clone(), config);
    renderer.set_size(WIDTH, HEIGHT);
    log::info!("Driver: {:?}", renderer.driver().capabilities());

    let scene = build_scene(&mut renderer);
    let camera = Camera::perspective(
        50.0_f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        50.0,
        Vec3::new(0.0, 4.0, 8.0),
        Vec3::ZERO,
    );

    let compiled = renderer.compile(&scene, &camera)?;
    log::info!("Precompiled {compiled} program(s)");

    for _ in 0..FRAMES {
        renderer.render(&scene, &camera, OutputTarget::Screen)?;
        let info = renderer.info();
        log::info!(
            "Frame {}: {} draw(s), {} skipped, {} triangle(s), {:.3} ms",
            info.frame,
            info.draw_calls,
            info.skipped_draws,
            info.triangles,
            renderer.last_frame_time().as_secs_f64() * 1000.0,
        );
    }

    for diagnostic in renderer.program_diagnostics() {
        log::warn!("{diagnostic}");
    }

    let readback = renderer.read_pixels_async(Rect::from_size(2, 2), OutputTarget::Screen)?;
    while renderer.pending_readbacks() > 0 {
        std::thread::sleep(renderer.readback_poll_interval());
        renderer.poll_readbacks();
    }
    let pixels = pollster::block_on(readback)?;
    log::info!("Read back {} byte(s), first pixel {:?}", pixels.len(), &pixels[..4.min(pixels.len())]);

    let info = renderer.info();
    log::info!(
        "Resident: {} program(s), {} texture(s), {} geometr(y/ies), {} driver call(s)",
        info.programs,
        info.textures,
        info.geometries,
        info.driver_calls,
    );
    Ok(())
}
