mod common;

use artifice_gl::api::RecordedUpload;
use artifice_gl::uniform::{OwnedUniformValues, ScalarType, SourceType, StructLayout, UniformType};
use artifice_gl::{ApiError, BindingTarget, Error, Program, Shader, ShaderStage, UsageError};
use common::Fixture;

// `u_transform` (vertex stage) takes location 0.
const FRAGMENT_SHADER: &str = r#"
#version 450
precision highp float;

uniform float u_time;
uniform vec2 u_offset;
uniform vec4 color;
uniform int u_mode;
uniform bool u_enabled;
uniform sampler2D u_texture;
uniform float weights[4];
uniform uint u_count;

layout(std140) uniform Globals {
    mat4 view;
} globals;

layout(location = 0) out vec4 frag_color;

void main() {
    frag_color = color * weights[0];
}
"#;

const STRUCT_SHADER: &str = r#"
#version 450
struct Params {
    int mode;
    vec2 offset;
    bool enabled;
};

struct Light {
    vec3 color;
    float intensity;
};

uniform Params params;
uniform Light lights[2];

out vec4 frag_color;
void main() {}
"#;

fn bytes_of_words(words: &[[u8; 4]]) -> Vec<u8> {
    words.iter().flat_map(|w| w.iter().copied()).collect()
}

fn location(program: &Program, name: &str) -> i32 {
    program.uniform_location(name).unwrap()
}

#[test]
fn link_builds_the_uniform_table() {
    let fx = Fixture::new();
    let program = fx.program(FRAGMENT_SHADER);
    assert!(program.is_linked());

    let color = program.uniform("color").unwrap();
    assert_eq!(color.location, 3);
    assert_eq!(color.ty, UniformType::VEC4);

    let weights = program.uniform("weights").unwrap();
    assert_eq!(weights.array_size, 4);
    assert_eq!(program.uniform_location("weights[2]"), Some(weights.location + 2));
    assert_eq!(program.uniform_location("weights[4]"), None);

    // block members have no location
    assert!(program.uniform("view").is_none());
    assert!(program.uniform("globals.view").is_none());
    assert_eq!(program.uniforms().len(), 9);
}

#[test]
fn relink_replaces_the_uniform_table() {
    let fx = Fixture::new();
    let vs = Shader::from_glsl(&fx.ctx, ShaderStage::Vertex, common::VERTEX_SHADER).unwrap();
    let fs = Shader::from_glsl(&fx.ctx, ShaderStage::Fragment, FRAGMENT_SHADER).unwrap();
    let mut program = Program::from_shaders(&fx.ctx, &[&vs, &fs]).unwrap();
    assert_eq!(program.uniform_location("color"), Some(3));

    let without_color = Shader::from_glsl(
        &fx.ctx,
        ShaderStage::Fragment,
        "uniform float u_time;\nout vec4 frag_color;\nvoid main() {}\n",
    )
    .unwrap();
    program.detach(&fs).unwrap();
    program.attach(&without_color).unwrap();
    program.link().unwrap();

    assert!(program.uniform("color").is_none());
    assert_eq!(program.uniform_location("u_time"), Some(1));
    let err = program.set_uniform_by_name("color", &[1.0f32; 4]).unwrap_err();
    assert_eq!(err.usage(), Some(&UsageError::UnknownUniform("color".to_string())));
}

#[test]
fn failed_uniform_query_leaves_the_program_unlinked() {
    let fx = Fixture::new();
    let mut program = fx.program(FRAGMENT_SHADER);
    let handle = program.handle().unwrap();
    assert_eq!(program.uniform_location("color"), Some(3));

    // the link goes through, the uniform query that follows does not
    fx.api.fail_after(1, ApiError::OutOfMemory);
    let err = program.link().unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::OutOfMemory)));

    assert!(!program.is_linked());
    assert!(program.uniforms().is_empty());
    assert_eq!(program.uniform_location("color"), None);
    let err = program.set_uniform_by_name("color", &[1.0f32; 4]).unwrap_err();
    assert_eq!(err.usage(), Some(&UsageError::NotLinked(handle)));

    program.link().unwrap();
    assert_eq!(program.uniform_location("color"), Some(3));
}

#[test]
fn link_failure_carries_the_log() {
    let fx = Fixture::new();
    let mut program = Program::new(&fx.ctx).unwrap();
    let handle = program.handle().unwrap();
    match program.link().unwrap_err() {
        Error::ProgramLink { program: p, log } => {
            assert_eq!(p, handle);
            assert!(log.contains("no shaders attached"), "{}", log);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!program.is_linked());
    assert!(program.uniforms().is_empty());

    let err = program.set_uniform(0, &1.0f32).unwrap_err();
    assert_eq!(err.usage(), Some(&UsageError::NotLinked(handle)));

    // the same name declared with different types in two stages
    let a = Shader::from_glsl(&fx.ctx, ShaderStage::Vertex, "uniform float x;\nvoid main() {}").unwrap();
    let b = Shader::from_glsl(&fx.ctx, ShaderStage::Fragment, "uniform int x;\nvoid main() {}").unwrap();
    program.attach(&a).unwrap();
    program.attach(&b).unwrap();
    assert!(matches!(program.link(), Err(Error::ProgramLink { .. })));
}

#[test]
fn uploads_make_the_program_current() {
    let fx = Fixture::new();
    let program = fx.program(FRAGMENT_SHADER);
    let other = fx.program(FRAGMENT_SHADER);
    other.bind().unwrap();

    program.set_uniform(location(&program, "u_time"), &0.5f32).unwrap();
    assert_eq!(
        fx.ctx.currently_bound(BindingTarget::PROGRAM),
        Some(program.handle().unwrap())
    );
    let uploads = fx.api.uniform_uploads();
    let last = uploads.last().unwrap();
    assert_eq!(last.program, program.handle().unwrap().id());
    assert_eq!(last.values, OwnedUniformValues::Float(vec![0.5]));

    // a second upload does not re-bind
    fx.api.clear_calls();
    program.set_uniform(location(&program, "u_time"), &1.0f32).unwrap();
    assert_eq!(fx.api.activation_count(), 0);
}

#[test]
fn numeric_values_are_coerced() {
    let fx = Fixture::new();
    let program = fx.program(FRAGMENT_SHADER);

    program.set_uniform_by_name("u_time", &7i32).unwrap();
    program.set_uniform_by_name("u_mode", &-2.7f32).unwrap();
    program.set_uniform_by_name("u_count", &3.9f64).unwrap();
    program.set_uniform_by_name("u_offset", &[1u32, 2]).unwrap();

    let read = |name: &str| program.read_uniform(location(&program, name)).unwrap();
    assert_eq!(read("u_time"), OwnedUniformValues::Float(vec![7.0]));
    assert_eq!(read("u_mode"), OwnedUniformValues::Int(vec![-2]));
    assert_eq!(read("u_count"), OwnedUniformValues::UInt(vec![3]));
    assert_eq!(read("u_offset"), OwnedUniformValues::Float(vec![1.0, 2.0]));
}

#[test]
fn bools_and_samplers() {
    let fx = Fixture::new();
    let program = fx.program(FRAGMENT_SHADER);

    program.set_uniform_by_name("u_enabled", &true).unwrap();
    assert_eq!(
        program.read_uniform(location(&program, "u_enabled")).unwrap(),
        OwnedUniformValues::Int(vec![1])
    );
    let err = program.set_uniform_by_name("u_enabled", &1.0f32).unwrap_err();
    assert_eq!(
        err.usage(),
        Some(&UsageError::IncompatibleUniformType {
            location: location(&program, "u_enabled"),
            declared: UniformType::BOOL,
            supplied: ScalarType::Float,
        })
    );
    let err = program.set_uniform_by_name("u_time", &true).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::IncompatibleUniformType { .. })));

    program.set_uniform_by_name("u_texture", &3u32).unwrap();
    assert_eq!(
        program.read_uniform(location(&program, "u_texture")).unwrap(),
        OwnedUniformValues::Int(vec![3])
    );
    let err = program.set_uniform_by_name("u_texture", &3.0f32).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::IncompatibleUniformType { .. })));
}

#[test]
fn vectors_matrices_and_arrays() {
    let fx = Fixture::new();
    let program = fx.program(FRAGMENT_SHADER);

    let transform = [
        [1.0f32, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [4.0, 5.0, 6.0, 1.0],
    ];
    program.set_uniform_by_name("u_transform", &transform).unwrap();
    let upload = fx.api.uniform_uploads().pop().unwrap();
    assert_eq!((upload.rows, upload.columns, upload.count), (4, 4, 1));
    match program.read_uniform(0).unwrap() {
        OwnedUniformValues::Float(v) => assert_eq!(&v[12..], &[4.0, 5.0, 6.0, 1.0]),
        other => panic!("unexpected values: {:?}", other),
    }

    let err = program.set_uniform_by_name("u_offset", &[1.0f32, 2.0, 3.0]).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::UniformCountMismatch { .. })));

    program.set_uniform_by_name("weights", &[1.0f32, 2.0, 3.0]).unwrap();
    program.set_uniform_by_name("weights[2]", &[5.0f32, 6.0]).unwrap();
    let base = location(&program, "weights");
    assert_eq!(program.read_uniform(base + 1).unwrap(), OwnedUniformValues::Float(vec![2.0]));
    assert_eq!(program.read_uniform(base + 2).unwrap(), OwnedUniformValues::Float(vec![5.0]));
    assert_eq!(program.read_uniform(base + 3).unwrap(), OwnedUniformValues::Float(vec![6.0]));

    // element 3 is the last one
    let err = program.set_uniform_by_name("weights[3]", &[1.0f32, 2.0]).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::UniformCountMismatch { .. })));
    // a location inside the array addresses the elements from there on
    program.set_uniform(base + 3, &9.0f32).unwrap();
    assert_eq!(program.read_uniform(base + 3).unwrap(), OwnedUniformValues::Float(vec![9.0]));

    let err = program.set_uniform(100, &1.0f32).unwrap_err();
    assert_eq!(err.usage(), Some(&UsageError::UnknownUniformLocation(100)));
}

#[test]
fn struct_members_upload_at_their_offsets() {
    let fx = Fixture::new();
    let program = fx.program(STRUCT_SHADER);
    let layout = StructLayout::new()
        .member("mode", SourceType::scalar(ScalarType::Int))
        .member("offset", SourceType::vector(ScalarType::Float, 2))
        .member("enabled", SourceType::scalar(ScalarType::Bool));
    assert_eq!(layout.offsets(), vec![0, 4, 12]);
    assert_eq!(layout.size(), 16);

    let data = bytes_of_words(&[
        7i32.to_ne_bytes(),
        1.5f32.to_ne_bytes(),
        2.5f32.to_ne_bytes(),
        1u32.to_ne_bytes(),
    ]);
    fx.api.clear_calls();
    program.set_struct_uniform("params", &layout, &data).unwrap();

    let program_id = program.handle().unwrap().id();
    let uploads = fx.api.uniform_uploads();
    assert_eq!(
        uploads,
        vec![
            RecordedUpload {
                program: program_id,
                location: location(&program, "params.mode"),
                rows: 1,
                columns: 1,
                count: 1,
                values: OwnedUniformValues::Int(vec![7]),
            },
            RecordedUpload {
                program: program_id,
                location: location(&program, "params.offset"),
                rows: 2,
                columns: 1,
                count: 1,
                values: OwnedUniformValues::Float(vec![1.5, 2.5]),
            },
            RecordedUpload {
                program: program_id,
                location: location(&program, "params.enabled"),
                rows: 1,
                columns: 1,
                count: 1,
                values: OwnedUniformValues::Int(vec![1]),
            },
        ]
    );

    let err = program
        .set_struct_uniform("params", &layout, &data[..12])
        .unwrap_err();
    assert_eq!(
        err.usage(),
        Some(&UsageError::StructDataTooShort {
            expected: 16,
            actual: 12
        })
    );
}

#[test]
fn inactive_struct_members_are_skipped() {
    let fx = Fixture::new();
    let program = fx.program(STRUCT_SHADER);
    let layout = StructLayout::new()
        .member("mode", SourceType::scalar(ScalarType::Int))
        .member("unused", SourceType::scalar(ScalarType::Double));
    let mut data = 3i32.to_ne_bytes().to_vec();
    data.extend_from_slice(&0.25f64.to_ne_bytes());
    fx.api.clear_calls();

    program.set_struct_uniform("params", &layout, &data).unwrap();
    assert_eq!(fx.api.uniform_uploads().len(), 1);
    assert_eq!(
        program.read_uniform(location(&program, "params.mode")).unwrap(),
        OwnedUniformValues::Int(vec![3])
    );
}

#[test]
fn struct_arrays_use_the_struct_size_as_stride() {
    let fx = Fixture::new();
    let program = fx.program(STRUCT_SHADER);
    let layout = StructLayout::new()
        .member("color", SourceType::vector(ScalarType::Float, 3))
        .member_as_float("intensity", SourceType::scalar(ScalarType::Double));
    assert_eq!(layout.size(), 20);

    let mut data = Vec::new();
    for (i, intensity) in [0.5f64, 0.1].iter().enumerate() {
        for c in 0..3 {
            data.extend_from_slice(&((i * 3 + c) as f32).to_ne_bytes());
        }
        data.extend_from_slice(&intensity.to_ne_bytes());
    }
    program
        .set_struct_array_uniform("lights", &layout, &data, 2)
        .unwrap();

    let read = |name: &str| program.read_uniform(location(&program, name)).unwrap();
    assert_eq!(read("lights[0].color"), OwnedUniformValues::Float(vec![0.0, 1.0, 2.0]));
    assert_eq!(read("lights[1].color"), OwnedUniformValues::Float(vec![3.0, 4.0, 5.0]));
    assert_eq!(read("lights[0].intensity"), OwnedUniformValues::Float(vec![0.5]));
    assert_eq!(read("lights[1].intensity"), OwnedUniformValues::Float(vec![0.1f64 as f32]));

    let err = program
        .set_struct_array_uniform("lights", &layout, &data, 3)
        .unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::StructDataTooShort { .. })));
}
