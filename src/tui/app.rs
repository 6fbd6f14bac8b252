//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::config::MachineConfig;
use crate::cpu::{BufferConsole, Machine, MemoryError};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine<BufferConsole>,
    /// Original program for reference.
    pub program: Vec<u32>,
    /// Machine settings the program was loaded with.
    pub config: MachineConfig,
    /// Values queued for READ_INT.
    pub input: Vec<i32>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u32>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view start address.
    pub mem_scroll: u32,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u32>, config: MachineConfig, input: Vec<i32>) -> Result<Self, MemoryError> {
        let machine = Self::build_machine(&program, &config, &input)?;

        Ok(Self {
            machine,
            mem_scroll: config.load_address,
            program,
            config,
            input,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
        })
    }

    fn build_machine(
        program: &[u32],
        config: &MachineConfig,
        input: &[i32],
    ) -> Result<Machine<BufferConsole>, MemoryError> {
        let console = BufferConsole::with_input(input.iter().copied());
        let mut machine = Machine::new(config.memory_size, console);
        machine.load_program(config.load_address, program)?;
        Ok(machine)
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.machine.is_halted() {
            self.status = format!("Halted after {} steps", self.machine.steps());
            self.running = false;
            return;
        }

        let pc = self.machine.pc();
        match self.machine.step() {
            Ok(fields) => {
                self.status = format!("{:08x}: {}", pc, disassemble_instruction(fields.raw));
            }
            Err(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or fault.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.machine.is_halted() {
            self.running = false;
            self.status = format!("Halted after {} steps", self.machine.steps());
            return;
        }

        self.step();
        if self.running && self.breakpoints.contains(&self.machine.pc()) {
            self.running = false;
            self.status = format!("Breakpoint at {:08x}", self.machine.pc());
        }
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at {:08x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at {:08x}", pc);
        }
    }

    /// Reload the program and restart from the load address.
    pub fn reset(&mut self) {
        match Self::build_machine(&self.program, &self.config, &self.input) {
            Ok(machine) => {
                self.machine = machine;
                self.status = "Reset. Ready.".into();
            }
            Err(e) => self.status = format!("Reset failed: {}", e),
        }
        self.running = false;
    }

    /// Get disassembly around the current PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u32, String, bool)> {
        let pc = self.machine.pc();
        let start = pc.saturating_sub((lines as u32 / 2) * 4);

        self.machine
            .mem
            .dump_words(start, lines)
            .into_iter()
            .map(|(addr, word)| (addr, disassemble_instruction(word), addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u32>, config: MachineConfig, input: Vec<i32>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut app = DebuggerApp::new(program, config, input)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(4);
                        }
                        KeyCode::Down => {
                            let last = (app.machine.mem.capacity() as u32).saturating_sub(4);
                            app.mem_scroll = (app.mem_scroll + 4).min(last);
                        }
                        KeyCode::PageUp => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(0x100);
                        }
                        KeyCode::PageDown => {
                            let last = (app.machine.mem.capacity() as u32).saturating_sub(4);
                            app.mem_scroll = app.mem_scroll.saturating_add(0x100).min(last);
                        }
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
