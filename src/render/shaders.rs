/// Light directions point from the surface toward the light; `w` is the intensity.
pub const KEY_LIGHT: [f32; 4] = [0.5, 1.0, 0.75, 0.8];
pub const FILL_LIGHT: [f32; 4] = [-0.6, -0.3, -0.8, 0.35];
pub const AMBIENT: f32 = 0.3;

pub const HIGHLIGHT_COLOR: [f32; 3] = [0.129, 0.508, 0.822];
pub const NEUTRAL_GREY: f32 = 0.8;

/// Uniform block shared by the display and picking programs.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub key_light: [f32; 4],
    pub fill_light: [f32; 4],
    /// Object index to highlight; 0 matches nothing.
    pub selected_index: u32,
    pub use_tint: u32,
    pub _padding: [u32; 2],
}

impl SceneUniforms {
    pub fn new(view_proj: glam::Mat4, selected_index: u32, use_tint: bool) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            key_light: KEY_LIGHT,
            fill_light: FILL_LIGHT,
            selected_index,
            use_tint: use_tint as u32,
            _padding: [0; 2],
        }
    }
}

/// Both programs live in one module: `vs_display`/`fs_display` for the visible pass and
/// `vs_pick`/`fs_pick` for the offscreen index pass.
pub const SCENE_SHADER: &str = r#"
struct SceneUniforms {
    view_proj: mat4x4<f32>,
    key_light: vec4<f32>,
    fill_light: vec4<f32>,
    selected_index: u32,
    use_tint: u32,
    _padding: vec2<u32>,
};

@group(0) @binding(0)
var<uniform> scene: SceneUniforms;

const HIGHLIGHT: vec3<f32> = vec3<f32>(0.129, 0.508, 0.822);
const NEUTRAL: vec3<f32> = vec3<f32>(0.8, 0.8, 0.8);
const AMBIENT: f32 = 0.3;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tint: vec4<f32>,
    @location(3) index_color: vec4<f32>,
};

fn decode_index(c: vec3<f32>) -> u32 {
    let bytes = vec3<u32>(round(c * 255.0));
    return (bytes.x << 16u) | (bytes.y << 8u) | bytes.z;
}

fn lambert(n: vec3<f32>, light: vec4<f32>) -> f32 {
    return max(dot(n, normalize(light.xyz)), 0.0) * light.w;
}

struct DisplayOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_display(in: VertexIn) -> DisplayOut {
    var out: DisplayOut;
    out.clip = scene.view_proj * vec4<f32>(in.position, 1.0);
    if (decode_index(in.index_color.rgb) == scene.selected_index) {
        out.color = HIGHLIGHT;
    } else {
        var base = NEUTRAL;
        if (scene.use_tint != 0u) {
            base = in.tint.rgb;
        }
        let n = normalize(in.normal);
        let light = AMBIENT + lambert(n, scene.key_light) + lambert(n, scene.fill_light);
        out.color = base * light;
    }
    return out;
}

@fragment
fn fs_display(in: DisplayOut) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}

struct PickOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) @interpolate(flat) index_color: vec4<f32>,
};

@vertex
fn vs_pick(in: VertexIn) -> PickOut {
    var out: PickOut;
    out.clip = scene.view_proj * vec4<f32>(in.position, 1.0);
    out.index_color = in.index_color;
    return out;
}

@fragment
fn fs_pick(in: PickOut) -> @location(0) vec4<f32> {
    return vec4<f32>(in.index_color.rgb, 1.0);
}
"#;
