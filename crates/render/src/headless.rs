use crate::context::{GraphicsContext, ProgramHandle, ShaderError, ShaderHandle, ShaderStage};
use glasm_common::ClearColor;
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// A command received by [`HeadlessGraphics`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsCommand {
    CreateShader { stage: ShaderStage, label: String },
    LinkProgram { label: String, program: ProgramHandle },
    SetClearColor(ClearColor),
    Clear,
}

struct CompiledShader {
    stage: ShaderStage,
    module: naga::Module,
}

/// Graphics context without a GPU.
///
/// Compiles WGSL through naga's front end and validator, so syntax and type
/// errors surface exactly as they would on a device. Linking checks that each
/// stage exposes a matching entry point. Useful for CLI checks, headless runs,
/// and tests.
#[derive(Default)]
pub struct HeadlessGraphics {
    shaders: Vec<CompiledShader>,
    program_count: u32,
    clear_color: ClearColor,
    commands: Vec<GraphicsCommand>,
}

impl HeadlessGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful command so far.
    pub fn commands(&self) -> &[GraphicsCommand] {
        &self.commands
    }

    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    pub fn clear_color(&self) -> ClearColor {
        self.clear_color
    }

    fn shader(&self, handle: ShaderHandle) -> Result<&CompiledShader, ShaderError> {
        self.shaders
            .get(handle.0 as usize)
            .ok_or(ShaderError::UnknownShader(handle))
    }
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

impl GraphicsContext for HeadlessGraphics {
    fn backend_name(&self) -> &str {
        "headless"
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<ShaderHandle, ShaderError> {
        let compile_error = |log: String| ShaderError::Compile {
            stage,
            label: label.to_owned(),
            log,
        };
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| compile_error(e.emit_to_string(source)))?;
        Validator::new(ValidationFlags::all(), Capabilities::empty())
            .validate(&module)
            .map_err(|e| compile_error(e.emit_to_string(source)))?;

        let handle = ShaderHandle(self.shaders.len() as u32);
        self.shaders.push(CompiledShader { stage, module });
        self.commands.push(GraphicsCommand::CreateShader {
            stage,
            label: label.to_owned(),
        });
        tracing::trace!(%stage, label, "compiled shader");
        Ok(handle)
    }

    fn link_program(
        &mut self,
        label: &str,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, ShaderError> {
        for (handle, expected) in [(vertex, ShaderStage::Vertex), (fragment, ShaderStage::Fragment)] {
            let shader = self.shader(handle)?;
            let link_error = |log: String| ShaderError::Link {
                label: label.to_owned(),
                log,
            };
            if shader.stage != expected {
                return Err(link_error(format!(
                    "{handle:?} was compiled as a {} shader, expected {expected}",
                    shader.stage
                )));
            }
            if !shader
                .module
                .entry_points
                .iter()
                .any(|ep| ep.stage == naga_stage(expected))
            {
                return Err(link_error(format!(
                    "{expected} shader has no @{expected} entry point"
                )));
            }
        }

        let program = ProgramHandle(self.program_count);
        self.program_count += 1;
        self.commands.push(GraphicsCommand::LinkProgram {
            label: label.to_owned(),
            program,
        });
        Ok(program)
    }

    fn set_clear_color(&mut self, color: ClearColor) {
        self.clear_color = color;
        self.commands.push(GraphicsCommand::SetClearColor(color));
    }

    fn clear(&mut self) {
        self.commands.push(GraphicsCommand::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = r#"
        @vertex
        fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
        }
    "#;
    const FRAG: &str = r#"
        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.5, 0.0, 1.0);
        }
    "#;

    #[test]
    fn valid_pair_links() {
        let mut gfx = HeadlessGraphics::new();
        let vs = gfx.create_shader(ShaderStage::Vertex, "v", VERT).unwrap();
        let fs = gfx.create_shader(ShaderStage::Fragment, "f", FRAG).unwrap();
        assert_eq!(gfx.link_program("p", vs, fs).unwrap(), ProgramHandle(0));
        assert_eq!(gfx.program_count(), 1);
    }

    #[test]
    fn syntax_error_reports_naga_diagnostic() {
        let mut gfx = HeadlessGraphics::new();
        let err = gfx
            .create_shader(ShaderStage::Fragment, "bad.wgsl", "@fragment fn fs_main( {")
            .unwrap_err();
        match err {
            ShaderError::Compile { stage, label, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(label, "bad.wgsl");
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(gfx.commands().is_empty());
    }

    #[test]
    fn type_error_fails_validation() {
        let mut gfx = HeadlessGraphics::new();
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1u; }";
        assert!(matches!(
            gfx.create_shader(ShaderStage::Fragment, "f", src),
            Err(ShaderError::Compile { .. })
        ));
    }

    #[test]
    fn link_requires_matching_entry_points() {
        let mut gfx = HeadlessGraphics::new();
        // Both sources are valid WGSL, but the "vertex" one only has a fragment entry point.
        let vs = gfx.create_shader(ShaderStage::Vertex, "v", FRAG).unwrap();
        let fs = gfx.create_shader(ShaderStage::Fragment, "f", FRAG).unwrap();
        let err = gfx.link_program("p", vs, fs).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
        assert_eq!(gfx.program_count(), 0);
    }

    #[test]
    fn link_rejects_swapped_stages() {
        let mut gfx = HeadlessGraphics::new();
        let vs = gfx.create_shader(ShaderStage::Vertex, "v", VERT).unwrap();
        let fs = gfx.create_shader(ShaderStage::Fragment, "f", FRAG).unwrap();
        assert!(gfx.link_program("p", fs, vs).is_err());
        assert_eq!(
            gfx.link_program("p", vs, ShaderHandle(99)),
            Err(ShaderError::UnknownShader(ShaderHandle(99)))
        );
    }

    #[test]
    fn clear_commands_are_recorded() {
        let mut gfx = HeadlessGraphics::new();
        gfx.set_clear_color(ClearColor::default());
        gfx.clear();
        assert_eq!(
            gfx.commands(),
            &[
                GraphicsCommand::SetClearColor(ClearColor::default()),
                GraphicsCommand::Clear
            ]
        );
    }
}
