use crate::context::{GraphicsContext, ProgramHandle, ShaderError, ShaderHandle, ShaderStage};
use glasm_common::ShaderPair;

/// A vertex + fragment pair compiled and linked into one program.
///
/// Construction is the only way to produce one; change the sources by
/// building a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pair: ShaderPair,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    program: ProgramHandle,
}

impl ShaderProgram {
    /// Compile both stages and link them. The first failure aborts.
    pub fn compile(
        ctx: &mut dyn GraphicsContext,
        pair: &ShaderPair,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let _span = tracing::debug_span!("compile_program", program = %pair.label()).entered();

        let vertex = ctx.create_shader(ShaderStage::Vertex, pair.vertex.as_str(), vertex_source)?;
        let fragment =
            ctx.create_shader(ShaderStage::Fragment, pair.fragment.as_str(), fragment_source)?;
        let program = ctx.link_program(&pair.label(), vertex, fragment)?;

        tracing::debug!(?program, "linked shader program");
        Ok(Self {
            pair: pair.clone(),
            vertex,
            fragment,
            program,
        })
    }

    pub fn pair(&self) -> &ShaderPair {
        &self.pair
    }

    pub fn vertex_shader(&self) -> ShaderHandle {
        self.vertex
    }

    pub fn fragment_shader(&self) -> ShaderHandle {
        self.fragment
    }

    pub fn handle(&self) -> ProgramHandle {
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{GraphicsCommand, HeadlessGraphics};

    const VERT: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
    const FRAG: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    #[test]
    fn compile_links_both_stages() {
        let mut gfx = HeadlessGraphics::new();
        let pair = ShaderPair::new("a.vert.wgsl", "a.frag.wgsl");
        let program = ShaderProgram::compile(&mut gfx, &pair, VERT, FRAG).unwrap();

        assert_eq!(program.pair(), &pair);
        assert_ne!(program.vertex_shader(), program.fragment_shader());
        assert_eq!(
            gfx.commands(),
            &[
                GraphicsCommand::CreateShader {
                    stage: ShaderStage::Vertex,
                    label: "a.vert.wgsl".into(),
                },
                GraphicsCommand::CreateShader {
                    stage: ShaderStage::Fragment,
                    label: "a.frag.wgsl".into(),
                },
                GraphicsCommand::LinkProgram {
                    label: "a.vert.wgsl+a.frag.wgsl".into(),
                    program: program.handle(),
                },
            ]
        );
    }

    #[test]
    fn fragment_failure_skips_link() {
        let mut gfx = HeadlessGraphics::new();
        let pair = ShaderPair::new("a.vert.wgsl", "broken.frag.wgsl");
        let err = ShaderProgram::compile(&mut gfx, &pair, VERT, "fn nope( {").unwrap_err();

        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert!(
            !gfx.commands()
                .iter()
                .any(|c| matches!(c, GraphicsCommand::LinkProgram { .. }))
        );
        assert_eq!(gfx.program_count(), 0);
    }
}
