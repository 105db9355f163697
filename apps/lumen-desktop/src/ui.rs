use egui::Context as EguiContext;
use glam::Vec3;
use lumen_author::{EditCommand, EditOutcome};
use lumen_scene::{
    LightKey, Material, MaterialKey, Object, ObjectKey, PointLight, SceneStore, ShapeKind,
};

use crate::state::{AppState, Selection};

/// Draw the editor panels. Every widget edits a copy; a changed copy is
/// applied as one edit command.
pub fn draw(state: &mut AppState, ctx: &EguiContext) {
    if !state.show_editor {
        return;
    }
    state.validate_selection();

    egui::SidePanel::left("scene")
        .default_width(240.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| scene_panel(ui, state));
        });

    if let Some(selection) = state.selection {
        egui::SidePanel::right("inspector")
            .default_width(280.0)
            .show(ctx, |ui| match selection {
                Selection::Object(key) => object_editor(ui, state, key),
                Selection::Light(key) => light_editor(ui, state, key),
                Selection::Material(key) => material_editor(ui, state, key),
                Selection::Params => params_editor(ui, state),
            });
    }
}

fn scene_panel(ui: &mut egui::Ui, state: &mut AppState) {
    ui.heading("lumen");
    ui.separator();
    let ms = state.frame_time * 1000.0;
    let fps = if state.frame_time > 0.0 { 1.0 / state.frame_time } else { 0.0 };
    ui.label(format!("Frame: {ms:.1} ms ({fps:.0} fps)"));
    if let Some(report) = state.last_report {
        ui.label(format!("Pass: {}", report.pass_index));
    }
    let summary = state.scene.summary();
    ui.label(format!(
        "Objects: {}/{}  Lights: {}/{}",
        summary.objects,
        state.editor.max_objects(),
        summary.lights,
        state.editor.max_lights()
    ));
    let p = state.camera.position;
    ui.label(format!("Camera: ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z));
    ui.separator();

    if ui
        .selectable_label(state.selection == Some(Selection::Params), "Render settings")
        .clicked()
    {
        state.selection = Some(Selection::Params);
    }

    ui.horizontal(|ui| {
        ui.heading("Objects");
        if ui.button("+").clicked() {
            let position = state.camera.position + state.camera.forward() * 3.0;
            let material = state.scene.default_material();
            if let Some(EditOutcome::ObjectAdded(key)) =
                state.apply(EditCommand::AddObject(Object::sphere(position, 0.5, material)))
            {
                state.selection = Some(Selection::Object(key));
            }
        }
    });
    let objects: Vec<(ObjectKey, ShapeKind)> =
        state.scene.objects().map(|(k, o)| (k, o.kind)).collect();
    for (slot, (key, kind)) in objects.into_iter().enumerate() {
        let selected = state.selection == Some(Selection::Object(key));
        if ui
            .selectable_label(selected, format!("{slot}: {}", kind.label()))
            .clicked()
        {
            state.selection = Some(Selection::Object(key));
        }
    }

    ui.horizontal(|ui| {
        ui.heading("Lights");
        if ui.button("+").clicked() {
            let light = PointLight {
                position: state.camera.position + Vec3::Y,
                radius: 0.2,
                power: 10.0,
                reach: 20.0,
                ..PointLight::default()
            };
            if let Some(EditOutcome::LightAdded(key)) = state.apply(EditCommand::AddLight(light)) {
                state.selection = Some(Selection::Light(key));
            }
        }
    });
    let lights: Vec<LightKey> = state.scene.lights().map(|(k, _)| k).collect();
    for (slot, key) in lights.into_iter().enumerate() {
        let selected = state.selection == Some(Selection::Light(key));
        if ui.selectable_label(selected, format!("Light {slot}")).clicked() {
            state.selection = Some(Selection::Light(key));
        }
    }

    ui.horizontal(|ui| {
        ui.heading("Materials");
        if ui.button("+").clicked() {
            if let Some(EditOutcome::MaterialAdded(key)) =
                state.apply(EditCommand::AddMaterial(Material::default()))
            {
                state.selection = Some(Selection::Material(key));
            }
        }
    });
    let materials: Vec<MaterialKey> = state.scene.materials().map(|(k, _)| k).collect();
    for (slot, key) in materials.into_iter().enumerate() {
        let selected = state.selection == Some(Selection::Material(key));
        if ui.selectable_label(selected, format!("Material {slot}")).clicked() {
            state.selection = Some(Selection::Material(key));
        }
    }

    ui.separator();
    if ui.button("Save scene").clicked() {
        if let Err(e) = state.save_scene() {
            tracing::warn!("saving {} failed: {e}", state.scene_path().display());
        }
    }
    ui.small("F1: editor | Tab: mouse look | WASD/Space/Shift: move | R: reload shader and skybox | F5: save");
}

fn object_editor(ui: &mut egui::Ui, state: &mut AppState, key: ObjectKey) {
    let Some(before) = state.scene.object_by_key(key).copied() else {
        return;
    };
    let mut value = before;

    ui.heading("Object");
    ui.horizontal(|ui| {
        for kind in ShapeKind::ALL {
            ui.radio_value(&mut value.kind, kind, kind.label());
        }
    });
    vec3_drag(ui, "Position", &mut value.position, 0.05);
    if value.kind == ShapeKind::Sphere {
        let mut radius = value.radius();
        ui.add(
            egui::DragValue::new(&mut radius)
                .prefix("Radius: ")
                .speed(0.02)
                .range(0.01..=100.0),
        );
        if radius != value.radius() {
            value.scale = Vec3::splat(radius);
        }
    } else {
        vec3_drag(ui, "Scale", &mut value.scale, 0.02);
    }
    material_picker(ui, "object_material", &state.scene, &mut value.material);
    let delete = ui.button("Delete").clicked();

    if value != before {
        state.apply(EditCommand::SetObject { key, value });
    }
    if delete {
        state.apply(EditCommand::RemoveObject(key));
        state.selection = None;
    }
}

fn light_editor(ui: &mut egui::Ui, state: &mut AppState, key: LightKey) {
    let Some(before) = state.scene.light_by_key(key).copied() else {
        return;
    };
    let mut value = before;

    ui.heading("Light");
    vec3_drag(ui, "Position", &mut value.position, 0.05);
    color_edit(ui, "Color", &mut value.color);
    ui.add(egui::Slider::new(&mut value.radius, 0.0..=5.0).text("radius"));
    ui.add(egui::Slider::new(&mut value.power, 0.0..=200.0).text("power"));
    ui.add(egui::Slider::new(&mut value.reach, 0.0..=200.0).text("reach"));
    let delete = ui.button("Delete").clicked();

    if value != before {
        state.apply(EditCommand::SetLight { key, value });
    }
    if delete {
        state.apply(EditCommand::RemoveLight(key));
        state.selection = None;
    }
}

fn material_editor(ui: &mut egui::Ui, state: &mut AppState, key: MaterialKey) {
    let Some(before) = state.scene.material_by_key(key).copied() else {
        return;
    };
    let mut value = before;

    ui.heading("Material");
    let users = state.scene.objects_using(key).count();
    ui.label(format!("Used by {users} object(s)"));
    color_edit(ui, "Albedo", &mut value.albedo);
    color_edit(ui, "Emission", &mut value.emission);
    ui.add(egui::Slider::new(&mut value.emission_strength, 0.0..=50.0).text("emission strength"));
    color_edit(ui, "Specular", &mut value.specular);
    ui.add(egui::Slider::new(&mut value.roughness, 0.0..=1.0).text("roughness"));
    ui.add(egui::Slider::new(&mut value.specular_highlight, 0.0..=10.0).text("highlight"));
    ui.add(
        egui::Slider::new(&mut value.specular_exponent, 1.0..=512.0)
            .logarithmic(true)
            .text("exponent"),
    );
    ui.checkbox(&mut value.transparent, "Transparent");
    ui.add_enabled(
        value.transparent,
        egui::Slider::new(&mut value.refractive_index, 1.0..=3.0).text("IOR"),
    );

    if value != before {
        state.apply(EditCommand::SetMaterial { key, value });
    }
}

fn params_editor(ui: &mut egui::Ui, state: &mut AppState) {
    let before = *state.scene.params();
    let mut value = before;

    ui.heading("Render settings");
    ui.add(egui::Slider::new(&mut value.shadow_resolution, 1..=256).text("shadow samples"));
    ui.add(egui::Slider::new(&mut value.max_bounces, 0..=16).text("max bounces"));
    ui.add(egui::Slider::new(&mut value.sky_gamma, 0.1..=4.0).text("sky gamma"));
    ui.add(egui::Slider::new(&mut value.sky_strength, 0.0..=10.0).text("sky strength"));
    ui.separator();
    ui.checkbox(&mut value.plane_visible, "Ground plane");
    material_picker(ui, "plane_material", &state.scene, &mut value.plane_material);

    if value != before {
        state.apply(EditCommand::SetParams(value));
    }
}

fn vec3_drag(ui: &mut egui::Ui, label: &str, v: &mut Vec3, speed: f64) {
    ui.label(label);
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut v.x).prefix("X: ").speed(speed));
        ui.add(egui::DragValue::new(&mut v.y).prefix("Y: ").speed(speed));
        ui.add(egui::DragValue::new(&mut v.z).prefix("Z: ").speed(speed));
    });
}

fn color_edit(ui: &mut egui::Ui, label: &str, v: &mut Vec3) {
    ui.horizontal(|ui| {
        let mut rgb = v.to_array();
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            *v = Vec3::from_array(rgb);
        }
        ui.label(label);
    });
}

fn material_picker(ui: &mut egui::Ui, id: &str, scene: &SceneStore, current: &mut MaterialKey) {
    let selected = match scene.material_slot(*current) {
        Some(slot) => format!("Material {slot}"),
        None => "(missing)".to_string(),
    };
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected)
        .show_ui(ui, |ui| {
            for (slot, (key, _)) in scene.materials().enumerate() {
                ui.selectable_value(current, key, format!("Material {slot}"));
            }
        });
}
