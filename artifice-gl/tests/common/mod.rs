#![allow(dead_code)]

use artifice_gl::{Context, ContextConfig, HeadlessGl, Program, Shader, ShaderStage};
use std::rc::Rc;

pub const VERTEX_SHADER: &str = r#"
#version 450
uniform mat4 u_transform;
in vec3 a_position;
void main() {
    gl_Position = u_transform * vec4(a_position, 1.0);
}
"#;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A context over a fresh in-memory API.
pub struct Fixture {
    pub ctx: Context,
    pub api: Rc<HeadlessGl>,
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_config(ContextConfig::new())
    }

    pub fn with_config(config: ContextConfig) -> Fixture {
        init_logger();
        let (ctx, api) = Context::headless(config);
        Fixture { ctx, api }
    }

    /// Compiles `fragment_source` and links it with a trivial vertex shader.
    pub fn program(&self, fragment_source: &str) -> Program {
        let vs = Shader::from_glsl(&self.ctx, ShaderStage::Vertex, VERTEX_SHADER).unwrap();
        let fs = Shader::from_glsl(&self.ctx, ShaderStage::Fragment, fragment_source).unwrap();
        Program::from_shaders(&self.ctx, &[&vs, &fs]).unwrap()
    }
}
