use crate::{
    binding::BindingTarget,
    context::Context,
    error::{Error, GlResult, UsageError},
    handle::{ContextObject, Handle, ObjectKind},
    property::{CachedProperties, Origin},
    uniform::{upload_uniform, AsUniform, OwnedUniformValues, StructLayout, UniformTable, UniformVariable},
};
use tracing::{debug, trace, trace_span};

/// Shader stages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

/// A shader object.
#[derive(Debug)]
pub struct Shader {
    obj: ContextObject,
    stage: ShaderStage,
    source: Option<String>,
    compiled: bool,
}

impl Shader {
    pub fn new(ctx: &Context, stage: ShaderStage) -> GlResult<Shader> {
        let obj = ContextObject::create(ctx, ObjectKind::Shader, |api| api.create_shader(stage))?;
        Ok(Shader {
            obj,
            stage,
            source: None,
            compiled: false,
        })
    }

    /// Creates a shader and compiles `source`.
    pub fn from_glsl(ctx: &Context, stage: ShaderStage, source: &str) -> GlResult<Shader> {
        let mut shader = Shader::new(ctx, stage)?;
        shader.set_source(source)?;
        shader.compile()?;
        Ok(shader)
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The last source set on this shader.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Replaces the source. The shader must be compiled again before it can be linked.
    pub fn set_source(&mut self, source: &str) -> GlResult<()> {
        let handle = self.obj.handle()?;
        self.obj.context().api().shader_source(handle.raw(), source)?;
        self.source = Some(source.to_string());
        self.compiled = false;
        Ok(())
    }

    /// Compiles the current source. On failure, the error carries the compiler log.
    pub fn compile(&mut self) -> GlResult<()> {
        let handle = self.obj.handle()?;
        if self.source.is_none() {
            return Err(UsageError::NoShaderSource(handle).into());
        }
        let api = self.obj.context().api();
        self.compiled = api.compile_shader(handle.raw())?;
        if !self.compiled {
            let log = api.shader_info_log(handle.raw());
            debug!(%handle, stage = ?self.stage, %log, "shader compilation failed");
            return Err(Error::ShaderCompilation {
                shader: handle,
                stage: self.stage,
                log,
            });
        }
        Ok(())
    }

    pub fn dispose(&mut self) -> bool {
        self.obj.dispose()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProgramProperty {
    Uniforms,
    AttachedShaders,
    LinkStatus,
}

/// Cached state of a program. The uniform table is rebuilt after every successful link.
#[derive(Debug, Default)]
pub struct ProgramProperties {
    attached: Vec<Handle>,
    linked: bool,
    uniforms: UniformTable,
}

impl ProgramProperties {
    pub fn attached_shaders(&self) -> &[Handle] {
        &self.attached
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }
}

impl CachedProperties for ProgramProperties {
    type Key = ProgramProperty;

    fn origin(&self, key: ProgramProperty) -> Origin {
        match key {
            ProgramProperty::Uniforms => Origin::Queried,
            ProgramProperty::AttachedShaders | ProgramProperty::LinkStatus => Origin::Authoritative,
        }
    }

    // the uniform table only changes on link, and is replaced right away
    fn invalidate(&self, _key: ProgramProperty) {}
}

/// A program object.
#[derive(Debug)]
pub struct Program {
    obj: ContextObject,
    props: ProgramProperties,
}

impl Program {
    pub fn new(ctx: &Context) -> GlResult<Program> {
        let obj = ContextObject::create(ctx, ObjectKind::Program, |api| api.create(ObjectKind::Program))?;
        Ok(Program {
            obj,
            props: ProgramProperties::default(),
        })
    }

    /// Creates a program from compiled shaders and links it.
    pub fn from_shaders(ctx: &Context, shaders: &[&Shader]) -> GlResult<Program> {
        let mut program = Program::new(ctx)?;
        for shader in shaders {
            program.attach(shader)?;
        }
        program.link()?;
        Ok(program)
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn object(&self) -> &ContextObject {
        &self.obj
    }

    pub fn properties(&self) -> &ProgramProperties {
        &self.props
    }

    pub fn attach(&mut self, shader: &Shader) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let shader = shader.handle()?;
        if self.props.attached.contains(&shader) {
            return Ok(());
        }
        self.obj
            .context()
            .api()
            .attach_shader(handle.raw(), shader.raw())?;
        self.props.attached.push(shader);
        Ok(())
    }

    pub fn detach(&mut self, shader: &Shader) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let shader = shader.handle()?;
        if !self.props.attached.contains(&shader) {
            return Ok(());
        }
        self.obj
            .context()
            .api()
            .detach_shader(handle.raw(), shader.raw())?;
        self.props.attached.retain(|s| *s != shader);
        Ok(())
    }

    /// Links the program and rebuilds the uniform table.
    ///
    /// On failure, including a failed uniform query, the program is left unlinked with an empty
    /// uniform table. A link failure carries the linker log.
    pub fn link(&mut self) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let _span = trace_span!("link", program = %handle).entered();
        // until the new uniform table is known, nothing from the previous link is valid
        self.props.linked = false;
        self.props.uniforms = UniformTable::default();
        let api = self.obj.context().api();
        let linked = api.link_program(handle.raw())?;
        if !linked {
            let log = api.program_info_log(handle.raw());
            debug!(%handle, %log, "link failed");
            return Err(Error::ProgramLink {
                program: handle,
                log,
            });
        }
        self.sync_after_link(handle)
    }

    fn sync_after_link(&mut self, handle: Handle) -> GlResult<()> {
        let active = self.obj.context().api().active_uniforms(handle.raw())?;
        self.props.uniforms = UniformTable::from_active(active);
        self.props.linked = true;
        debug!(%handle, uniforms = self.props.uniforms.len(), "linked");
        Ok(())
    }

    /// Makes the program current.
    pub fn bind(&self) -> GlResult<bool> {
        self.obj.bind(BindingTarget::PROGRAM)
    }

    pub fn unbind(&self) -> GlResult<bool> {
        self.obj.unbind(BindingTarget::PROGRAM)
    }

    pub fn is_linked(&self) -> bool {
        self.props.linked
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.props.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformVariable> {
        self.props.uniforms.get(name)
    }

    /// Location of a uniform, or of an array element (`weights[2]`).
    pub fn uniform_location(&self, name: &str) -> Option<i32> {
        self.props.uniforms.location(name)
    }

    fn linked_handle(&self) -> Result<Handle, UsageError> {
        let handle = self.obj.handle()?;
        if self.props.linked {
            Ok(handle)
        } else {
            Err(UsageError::NotLinked(handle))
        }
    }

    /// Sets the uniform at `location`. Locations inside an array address the elements from
    /// there on.
    ///
    /// Makes the program current first.
    pub fn set_uniform<V: AsUniform + ?Sized>(&self, location: i32, value: &V) -> GlResult<()> {
        self.linked_handle()?;
        let (variable, element) = self
            .props
            .uniforms
            .at_location(location)
            .ok_or(UsageError::UnknownUniformLocation(location))?;
        self.bind()?;
        upload_uniform(self.obj.context().api(), variable, element, value.as_uniform())
    }

    /// Sets a uniform by name (`color`, `lights[1].color`, `weights[2]`).
    pub fn set_uniform_by_name<V: AsUniform + ?Sized>(&self, name: &str, value: &V) -> GlResult<()> {
        self.linked_handle()?;
        let (variable, element) = self
            .props
            .uniforms
            .lookup(name)
            .ok_or_else(|| UsageError::UnknownUniform(name.to_string()))?;
        self.bind()?;
        upload_uniform(self.obj.context().api(), variable, element, value.as_uniform())
    }

    fn set_struct_members(
        &self,
        name: &str,
        layout: &StructLayout,
        data: &[u8],
        count: Option<usize>,
    ) -> GlResult<()> {
        self.linked_handle()?;
        let decoded = match count {
            None => layout.decode(data)?,
            Some(count) => layout.decode_array(data, count)?,
        };
        self.bind()?;
        let api = self.obj.context().api();
        for member in decoded.iter() {
            let full_name = match count {
                None => format!("{}.{}", name, member.member.name),
                Some(_) => format!("{}[{}].{}", name, member.element, member.member.name),
            };
            // members optimized out by the compiler are skipped
            match self.props.uniforms.lookup(&full_name) {
                Some((variable, element)) => {
                    trace!(member = %full_name, offset = member.offset, "struct_member");
                    upload_uniform(api, variable, element, member.values.as_data())?;
                }
                None => trace!(member = %full_name, "inactive struct member"),
            }
        }
        Ok(())
    }

    /// Sets the members of a struct uniform from host memory laid out as `layout`.
    pub fn set_struct_uniform(&self, name: &str, layout: &StructLayout, data: &[u8]) -> GlResult<()> {
        let _span = trace_span!("set_struct_uniform", name).entered();
        self.set_struct_members(name, layout, data, None)
    }

    /// Sets the first `count` elements of an array of structs. Elements are `layout.size()`
    /// bytes apart in `data`.
    pub fn set_struct_array_uniform(
        &self,
        name: &str,
        layout: &StructLayout,
        data: &[u8],
        count: usize,
    ) -> GlResult<()> {
        let _span = trace_span!("set_struct_array_uniform", name, count).entered();
        self.set_struct_members(name, layout, data, Some(count))
    }

    /// Reads back the value at `location`, in the upload representation of the declared type.
    pub fn read_uniform(&self, location: i32) -> GlResult<OwnedUniformValues> {
        let handle = self.linked_handle()?;
        let (variable, _) = self
            .props
            .uniforms
            .at_location(location)
            .ok_or(UsageError::UnknownUniformLocation(location))?;
        Ok(self
            .obj
            .context()
            .api()
            .read_uniform(handle.raw(), location, variable.ty)?)
    }

    pub fn dispose(&mut self) -> bool {
        self.obj.dispose()
    }
}
