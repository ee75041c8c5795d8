use glasm_common::ClearColor;
use glasm_render::{GraphicsContext, ProgramHandle, ShaderError, ShaderHandle, ShaderStage};

/// Errors from acquiring a device.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Where clears land.
enum Target {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// wgpu-backed graphics context.
pub struct WgpuGraphics {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    format: wgpu::TextureFormat,
    shaders: Vec<(ShaderStage, wgpu::ShaderModule)>,
    pipelines: Vec<wgpu::RenderPipeline>,
    clear_color: ClearColor,
}

impl WgpuGraphics {
    /// Wrap a surface that has already been configured with `config`.
    pub fn with_surface(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let format = config.format;
        Self::from_parts(device, queue, Target::Surface { surface, config }, format)
    }

    /// Create a device with no window and render into a texture.
    pub async fn offscreen(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glasm_offscreen_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let texture = Self::create_target_texture(&device, format, width, height);
        Ok(Self::from_parts(
            device,
            queue,
            Target::Offscreen { texture },
            format,
        ))
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: Target,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target,
            format,
            shaders: Vec::new(),
            pipelines: Vec::new(),
            clear_color: ClearColor::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Pipeline linked for `program`.
    pub fn pipeline(&self, program: ProgramHandle) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(program.0 as usize)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        match &mut self.target {
            Target::Surface { surface, config } => {
                config.width = width.max(1);
                config.height = height.max(1);
                surface.configure(&self.device, config);
            }
            Target::Offscreen { texture } => {
                *texture = Self::create_target_texture(&self.device, self.format, width, height);
            }
        }
    }

    /// Run `f` inside a validation error scope and return what it caught.
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    fn create_target_texture(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn clear_view(&self, view: &wgpu::TextureView) {
        let c = self.clear_color;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear_encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: c.r,
                            g: c.g,
                            b: c.b,
                            a: c.a,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GraphicsContext for WgpuGraphics {
    fn backend_name(&self) -> &str {
        "wgpu"
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<ShaderHandle, ShaderError> {
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        if let Some(error) = error {
            return Err(ShaderError::Compile {
                stage,
                label: label.to_owned(),
                log: error.to_string(),
            });
        }
        let handle = ShaderHandle(self.shaders.len() as u32);
        self.shaders.push((stage, module));
        Ok(handle)
    }

    fn link_program(
        &mut self,
        label: &str,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, ShaderError> {
        let module = |handle: ShaderHandle, expected: ShaderStage| {
            match self.shaders.get(handle.0 as usize) {
                Some((stage, module)) if *stage == expected => Ok(module),
                Some((stage, _)) => Err(ShaderError::Link {
                    label: label.to_owned(),
                    log: format!("{handle:?} was compiled as a {stage} shader, expected {expected}"),
                }),
                None => Err(ShaderError::UnknownShader(handle)),
            }
        };
        let vs = module(vertex, ShaderStage::Vertex)?;
        let fs = module(fragment, ShaderStage::Fragment)?;

        let (pipeline, error) = self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: None,
                vertex: wgpu::VertexState {
                    module: vs,
                    entry_point: None,
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: fs,
                    entry_point: None,
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        });
        if let Some(error) = error {
            return Err(ShaderError::Link {
                label: label.to_owned(),
                log: error.to_string(),
            });
        }

        let handle = ProgramHandle(self.pipelines.len() as u32);
        self.pipelines.push(pipeline);
        Ok(handle)
    }

    fn set_clear_color(&mut self, color: ClearColor) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        match &self.target {
            Target::Surface { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(&self.device, config);
                        return;
                    }
                    Err(e) => {
                        tracing::error!("surface error: {e}");
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.clear_view(&view);
                frame.present();
            }
            Target::Offscreen { texture } => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.clear_view(&view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = r#"
        @vertex
        fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(f32(i) * 0.01, 0.0, 0.0, 1.0);
        }
    "#;
    const FRAG: &str = r#"
        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0);
        }
    "#;

    fn device_or_skip() -> Option<WgpuGraphics> {
        match pollster::block_on(WgpuGraphics::offscreen(16, 16)) {
            Ok(gfx) => Some(gfx),
            Err(err) => {
                eprintln!("skipping: wgpu unavailable ({err})");
                None
            }
        }
    }

    #[test]
    fn links_a_valid_pair_into_a_pipeline() {
        let Some(mut gfx) = device_or_skip() else {
            return;
        };
        let vs = gfx.create_shader(ShaderStage::Vertex, "v", VERT).unwrap();
        let fs = gfx.create_shader(ShaderStage::Fragment, "f", FRAG).unwrap();
        let program = gfx.link_program("p", vs, fs).unwrap();
        assert!(gfx.pipeline(program).is_some());

        gfx.set_clear_color(ClearColor::new(0.0, 0.0, 0.0, 1.0));
        gfx.clear();
    }

    #[test]
    fn invalid_wgsl_is_a_compile_error() {
        let Some(mut gfx) = device_or_skip() else {
            return;
        };
        let err = gfx
            .create_shader(ShaderStage::Fragment, "bad", "@fragment fn fs_main( {")
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));
    }
}
