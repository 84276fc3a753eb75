use std::time::{ Duration, Instant };

use skulpin::winit;
use skulpin::rafx::api::RafxExtents2D;

use winit::event::{ ElementState, Event, KeyboardInput, ModifiersState, VirtualKeyCode, WindowEvent };
use winit::event_loop::{ ControlFlow, EventLoop };
use winit::window::Window;

use crate::app::AppState;
use crate::canvas::{ FigureArea, Painter, SkiaSurface };
use crate::config::WindowSpec;
use crate::cursor::RenderSurface;
use crate::error::{ Error, Result };
use crate::figure::PointerEvent;

/// How often the loop wakes up to collect background results.
const POLL_INTERVAL: Duration = Duration::from_millis(30);

pub struct Viewer {
    event_loop: EventLoop<()>,
    window: Window,
    renderer: skulpin::Renderer,
    painter: Painter,
    surface: SkiaSurface,
    app: AppState,
}

fn extents(window: &Window) -> RafxExtents2D {
    let window_size = window.inner_size();
    RafxExtents2D {
        width: window_size.width,
        height: window_size.height,
    }
}

impl Viewer {
    pub fn new(app: AppState, window_spec: &WindowSpec) -> Result<Viewer> {
        let event_loop = EventLoop::new();

        let logical_size = winit::dpi::LogicalSize::new(window_spec.width, window_spec.height);
        let window = winit::window::WindowBuilder::new()
            .with_title(window_spec.title.clone())
            .with_inner_size(logical_size)
            .with_resizable(true)
            .build(&event_loop)
            .map_err(|e| Error::Window(format!["Failed to create window: {}", e]))?;

        let renderer = skulpin::RendererBuilder::new()
            .coordinate_system(skulpin::CoordinateSystem::Logical)
            .build(&window, extents(&window))
            .map_err(|e| Error::Window(format!["Failed to create renderer: {:?}", e]))?;

        Ok(Viewer {
            event_loop,
            window,
            renderer,
            painter: Painter::new(),
            surface: SkiaSurface::default(),
            app,
        })
    }

    pub fn start_event_loop(self) {
        let Viewer { event_loop, window, mut renderer, mut painter, mut surface, mut app } = self;
        let mut modifiers = ModifiersState::empty();

        event_loop.run(move |event, _window_target, control_flow| {
            *control_flow = ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL);

            match event {
                Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                    app.shutdown(&mut surface);
                    *control_flow = ControlFlow::Exit;
                },

                Event::WindowEvent { event: WindowEvent::ModifiersChanged(state), .. } => {
                    modifiers = state;
                },

                Event::WindowEvent { event: WindowEvent::CursorMoved { position, .. }, .. } => {
                    if !surface.is_subscribed() {
                        return;
                    }
                    let size = window.inner_size().to_logical::<f32>(window.scale_factor());
                    let position = position.to_logical::<f32>(window.scale_factor());
                    let area = FigureArea::of_window(size.width, size.height);

                    let pointer = match &app.figure {
                        Some(figure) => figure.pointer_event(
                            position.x - area.left,
                            position.y - area.top,
                            area.width,
                            area.height,
                        ),
                        None => PointerEvent::outside(),
                    };
                    app.on_pointer_motion(&mut surface, &pointer);
                },

                Event::WindowEvent { event: WindowEvent::CursorLeft { .. }, .. } => {
                    app.on_pointer_motion(&mut surface, &PointerEvent::outside());
                },

                Event::WindowEvent {
                    event: WindowEvent::KeyboardInput {
                        input: KeyboardInput { virtual_keycode: Some(key), state: ElementState::Pressed, .. },
                        ..
                    },
                    ..
                } => {
                    match key {
                        VirtualKeyCode::Tab if modifiers.shift() => app.focus = app.focus.previous(),
                        VirtualKeyCode::Tab => app.focus = app.focus.next(),
                        VirtualKeyCode::Left => app.step_focused(-1),
                        VirtualKeyCode::Right => app.step_focused(1),
                        VirtualKeyCode::L => app.request_load(&mut surface),
                        VirtualKeyCode::Return => app.request_analysis(),
                        VirtualKeyCode::Escape => {
                            app.shutdown(&mut surface);
                            *control_flow = ControlFlow::Exit;
                        },
                        _ => return,
                    }
                    surface.draw_idle();
                },

                Event::WindowEvent { event: WindowEvent::Resized(_), .. } => {
                    surface.draw_idle();
                },

                Event::MainEventsCleared => {
                    if app.poll_updates(&mut surface) > 0 {
                        surface.draw_idle();
                    }
                    if surface.take_redraw() {
                        window.request_redraw();
                    }
                },

                Event::RedrawRequested(_window_id) => {
                    let scale_factor = window.scale_factor();
                    if let Err(e) = renderer.draw(extents(&window), scale_factor, |canvas, coordinate_system_helper| {
                        painter.draw(canvas, &coordinate_system_helper, &app);
                    }) {
                        error!("Error during draw: {:?}", e);
                        *control_flow = ControlFlow::Exit
                    }
                },

                _ => {}
            }
        });
    }
}
