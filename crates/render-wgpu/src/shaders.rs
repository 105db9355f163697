/// Built-in tracing program.
///
/// `{{MAX_OBJECTS}}` and `{{MAX_LIGHTS}}` are replaced with the device array
/// capacities before compilation. `fs_direct` renders one stochastic sample
/// into the offscreen target; `fs_composite` blends it into the running
/// average and presents the tonemapped result.
pub const TRACER_SHADER: &str = r#"
const MAX_OBJECTS: u32 = {{MAX_OBJECTS}}u;
const MAX_LIGHTS: u32 = {{MAX_LIGHTS}}u;
const PI: f32 = 3.14159265;
const EPS: f32 = 0.001;
const FAR: f32 = 1e30;
const MAX_SHADOW_SAMPLES: u32 = 64u;

struct Material {
    albedo: vec3<f32>,
    roughness: f32,
    emission: vec3<f32>,
    emission_strength: f32,
    specular: vec3<f32>,
    specular_highlight: f32,
    specular_exponent: f32,
    transparent: u32,
    refractive_index: f32,
    _pad: f32,
};

struct Object {
    position: vec3<f32>,
    kind: u32,
    scale: vec3<f32>,
    _pad: f32,
    material: Material,
};

struct Light {
    position: vec3<f32>,
    radius: f32,
    color: vec3<f32>,
    power: f32,
    reach: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

struct SceneParams {
    object_count: u32,
    light_count: u32,
    shadow_resolution: u32,
    max_bounces: u32,
    sky_gamma: f32,
    sky_strength: f32,
    plane_visible: u32,
    _pad: u32,
    plane_material: Material,
};

struct Frame {
    camera_rotation: mat4x4<f32>,
    camera_position: vec3<f32>,
    aspect_ratio: f32,
    time: f32,
    pass_index: u32,
    direct_mode: u32,
    _pad: u32,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var<uniform> params: SceneParams;
@group(0) @binding(2) var<uniform> objects: array<Object, {{MAX_OBJECTS}}>;
@group(0) @binding(3) var<uniform> lights: array<Light, {{MAX_LIGHTS}}>;

@group(1) @binding(0) var skybox: texture_2d<f32>;
@group(1) @binding(1) var sky_sampler: sampler;
@group(1) @binding(2) var accum_sample: texture_2d<f32>;
@group(1) @binding(3) var accum_history: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

@vertex
fn vs_fullscreen(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.ndc = position;
    return out;
}

// --- Random numbers ---

var<private> rng_state: u32;

fn pcg(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn seed_rng(pixel: vec2<u32>) {
    rng_state = pcg(pixel.x + pcg(pixel.y + pcg(frame.pass_index + pcg(bitcast<u32>(frame.time)))));
}

fn rand() -> f32 {
    rng_state = pcg(rng_state);
    return f32(rng_state >> 8u) / 16777216.0;
}

fn random_unit_vector() -> vec3<f32> {
    let z = rand() * 2.0 - 1.0;
    let a = rand() * 2.0 * PI;
    let r = sqrt(max(0.0, 1.0 - z * z));
    return vec3<f32>(r * cos(a), r * sin(a), z);
}

fn cosine_direction(n: vec3<f32>) -> vec3<f32> {
    let d = n + random_unit_vector();
    if (dot(d, d) < 1e-8) {
        return n;
    }
    return normalize(d);
}

// --- Intersection ---

struct Hit {
    t: f32,
    normal: vec3<f32>,
    front: bool,
    material: Material,
};

fn intersect_sphere(ro: vec3<f32>, rd: vec3<f32>, center: vec3<f32>, radius: f32) -> f32 {
    let oc = ro - center;
    let b = dot(oc, rd);
    let c = dot(oc, oc) - radius * radius;
    let h = b * b - c;
    if (h < 0.0) {
        return -1.0;
    }
    let s = sqrt(h);
    if (-b - s > EPS) {
        return -b - s;
    }
    if (-b + s > EPS) {
        return -b + s;
    }
    return -1.0;
}

// Returns (t, normal); t < 0 on a miss.
fn intersect_box(ro: vec3<f32>, rd: vec3<f32>, center: vec3<f32>, half_size: vec3<f32>) -> vec4<f32> {
    let inv = 1.0 / rd;
    let t0 = (center - half_size - ro) * inv;
    let t1 = (center + half_size - ro) * inv;
    let lo = min(t0, t1);
    let hi = max(t0, t1);
    let near = max(max(lo.x, lo.y), lo.z);
    let far = min(min(hi.x, hi.y), hi.z);
    if (near > far || far < EPS) {
        return vec4<f32>(-1.0);
    }
    var t = near;
    if (t < EPS) {
        t = far;
    }
    let local = ro + rd * t - center;
    let q = abs(local) / half_size;
    var n = vec3<f32>(0.0, 0.0, sign(local.z));
    if (q.x > q.y && q.x > q.z) {
        n = vec3<f32>(sign(local.x), 0.0, 0.0);
    } else if (q.y > q.z) {
        n = vec3<f32>(0.0, sign(local.y), 0.0);
    }
    return vec4<f32>(t, n);
}

fn trace_scene(ro: vec3<f32>, rd: vec3<f32>) -> Hit {
    var best: Hit;
    best.t = FAR;
    let count = min(params.object_count, MAX_OBJECTS);
    for (var i = 0u; i < count; i++) {
        let o = objects[i];
        if (o.kind == 1u) {
            let t = intersect_sphere(ro, rd, o.position, abs(o.scale.x));
            if (t > 0.0 && t < best.t) {
                best.t = t;
                best.normal = normalize(ro + rd * t - o.position);
                best.material = o.material;
            }
        } else if (o.kind == 2u) {
            let half_size = max(abs(o.scale) * 0.5, vec3<f32>(1e-4));
            let r = intersect_box(ro, rd, o.position, half_size);
            if (r.x > 0.0 && r.x < best.t) {
                best.t = r.x;
                best.normal = r.yzw;
                best.material = o.material;
            }
        }
    }
    if (params.plane_visible != 0u && abs(rd.y) > 1e-6) {
        let t = -ro.y / rd.y;
        if (t > EPS && t < best.t) {
            best.t = t;
            best.normal = vec3<f32>(0.0, 1.0, 0.0);
            best.material = params.plane_material;
        }
    }
    best.front = dot(rd, best.normal) < 0.0;
    if (!best.front) {
        best.normal = -best.normal;
    }
    return best;
}

fn occluded(ro: vec3<f32>, rd: vec3<f32>, max_t: f32) -> bool {
    return trace_scene(ro, rd).t < max_t;
}

// --- Shading ---

fn sky(rd: vec3<f32>) -> vec3<f32> {
    let u = atan2(rd.x, rd.z) / (2.0 * PI) + 0.5;
    let v = acos(clamp(rd.y, -1.0, 1.0)) / PI;
    let texel = textureSampleLevel(skybox, sky_sampler, vec2<f32>(u, v), 0.0).rgb;
    return pow(texel, vec3<f32>(params.sky_gamma)) * params.sky_strength;
}

fn direct_light(p: vec3<f32>, n: vec3<f32>, view: vec3<f32>, m: Material, samples: u32) -> vec3<f32> {
    var total = vec3<f32>(0.0);
    let count = min(params.light_count, MAX_LIGHTS);
    for (var i = 0u; i < count; i++) {
        let light = lights[i];
        let to_light = light.position - p;
        let dist = length(to_light);
        if (light.reach > 0.0 && dist > light.reach) {
            continue;
        }
        let l = to_light / dist;
        let ndl = dot(n, l);
        if (ndl <= 0.0) {
            continue;
        }

        var visible = 0.0;
        for (var s = 0u; s < samples; s++) {
            let sample_pos = light.position + random_unit_vector() * light.radius * sqrt(rand());
            let d = sample_pos - p;
            let len = length(d);
            if (!occluded(p + n * EPS, d / len, len - EPS)) {
                visible += 1.0;
            }
        }
        visible /= f32(samples);

        var falloff = light.power / max(dist * dist, 1e-4);
        if (light.reach > 0.0) {
            let f = 1.0 - dist / light.reach;
            falloff *= f * f;
        }
        let h = normalize(l + view);
        let highlight = pow(max(dot(n, h), 0.0), max(m.specular_exponent, 1.0)) * m.specular_highlight;
        total += light.color * falloff * visible * (m.albedo * ndl + m.specular * highlight);
    }
    return total;
}

fn radiance(origin: vec3<f32>, direction: vec3<f32>) -> vec3<f32> {
    var ro = origin;
    var rd = direction;
    var throughput = vec3<f32>(1.0);
    var color = vec3<f32>(0.0);
    let primary_samples = clamp(params.shadow_resolution, 1u, MAX_SHADOW_SAMPLES);

    for (var bounce = 0u; bounce <= params.max_bounces; bounce++) {
        let hit = trace_scene(ro, rd);
        if (hit.t >= FAR) {
            color += throughput * sky(rd);
            break;
        }
        let m = hit.material;
        let p = ro + rd * hit.t;
        let n = hit.normal;
        color += throughput * m.emission * m.emission_strength;

        if (m.transparent != 0u) {
            let eta = select(m.refractive_index, 1.0 / m.refractive_index, hit.front);
            let cos_i = min(dot(-rd, n), 1.0);
            var r0 = (1.0 - eta) / (1.0 + eta);
            r0 = r0 * r0;
            let fresnel = r0 + (1.0 - r0) * pow(1.0 - cos_i, 5.0);
            let refracted = refract(rd, n, eta);
            if (dot(refracted, refracted) == 0.0 || rand() < fresnel) {
                rd = reflect(rd, n);
                ro = p + n * EPS;
            } else {
                rd = normalize(refracted);
                ro = p - n * EPS;
                throughput *= m.albedo;
            }
        } else {
            let samples = select(1u, primary_samples, bounce == 0u);
            color += throughput * direct_light(p, n, -rd, m, samples);
            let spec_chance = clamp(max(m.specular.x, max(m.specular.y, m.specular.z)), 0.0, 1.0);
            if (rand() < spec_chance) {
                let rough = m.roughness * m.roughness;
                rd = normalize(mix(reflect(rd, n), cosine_direction(n), rough));
                throughput *= m.specular / spec_chance;
            } else {
                rd = cosine_direction(n);
                throughput *= m.albedo / (1.0 - spec_chance);
            }
            ro = p + n * EPS;
        }

        if (max(throughput.x, max(throughput.y, throughput.z)) < 1e-3) {
            break;
        }
    }
    return color;
}

@fragment
fn fs_direct(in: VertexOutput) -> @location(0) vec4<f32> {
    let pixel_size = fwidth(in.ndc);
    seed_rng(vec2<u32>(in.clip_position.xy));
    let jitter = (vec2<f32>(rand(), rand()) - 0.5) * pixel_size;
    let uv = in.ndc + jitter;
    let local = vec4<f32>(uv.x * frame.aspect_ratio, uv.y, 1.0, 0.0);
    let dir = normalize((frame.camera_rotation * local).xyz);
    let c = radiance(frame.camera_position, dir);
    return vec4<f32>(min(c, vec3<f32>(64.0)), 1.0);
}

struct CompositeOutput {
    @location(0) color: vec4<f32>,
    @location(1) history: vec4<f32>,
};

@fragment
fn fs_composite(in: VertexOutput) -> CompositeOutput {
    let pixel = vec2<i32>(in.clip_position.xy);
    let fresh = textureLoad(accum_sample, pixel, 0).rgb;
    let previous = textureLoad(accum_history, pixel, 0).rgb;
    let weight = 1.0 / f32(frame.pass_index + 1u);
    let blended = mix(previous, fresh, weight);

    var out: CompositeOutput;
    out.history = vec4<f32>(blended, 1.0);
    out.color = vec4<f32>(blended / (blended + vec3<f32>(1.0)), 1.0);
    return out;
}
"#;
