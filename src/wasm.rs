//! WebAssembly bindings for the simulator.
//!
//! This module provides JavaScript-friendly wrappers around the core machine.

use wasm_bindgen::prelude::*;
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_instruction;
use crate::config::MachineConfig;
use crate::cpu::{BufferConsole, Machine, NUM_REGISTERS};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
///
/// Console I/O goes through an in-memory buffer: queue input with
/// [`WasmMachine::push_input`] and collect printed values with
/// [`WasmMachine::output`].
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine<BufferConsole>,
    program: Vec<u32>,
    config: MachineConfig,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a new machine with default settings.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        let config = MachineConfig::default();
        let mut machine = Machine::new(config.memory_size, BufferConsole::new());
        machine.set_pc(config.load_address);
        Self {
            machine,
            program: Vec::new(),
            config,
        }
    }

    /// Load a program from assembly source code. Returns the word count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = words.len();
        self.program = words;
        self.reload()?;

        Ok(len)
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let fields = self.machine.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(disassemble_instruction(fields.raw))
    }

    /// Run until halt or `max_steps`. Returns the number of steps executed.
    #[wasm_bindgen]
    pub fn run(&mut self, max_steps: u32) -> Result<u64, JsError> {
        let outcome = self.machine.run(u64::from(max_steps))
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(outcome.steps())
    }

    /// Reset to the freshly loaded program. Queued input is kept.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.reload()
    }

    /// Queue a value for the next READ_INT trap.
    #[wasm_bindgen]
    pub fn push_input(&mut self, value: i32) {
        self.machine.console_mut().input.push_back(value);
    }

    /// Values printed by the program so far.
    #[wasm_bindgen]
    pub fn output(&self) -> Vec<i32> {
        self.machine.console().output.clone()
    }

    /// Diagnostics raised so far, one message per line.
    #[wasm_bindgen]
    pub fn diagnostics(&self) -> String {
        self.machine
            .console()
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.machine.steps()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u32 {
        self.machine.pc()
    }

    /// Get a single register value. Out-of-range indices read as zero.
    #[wasm_bindgen]
    pub fn register(&self, index: u8) -> u32 {
        if (index as usize) < NUM_REGISTERS {
            self.machine.regs.read(index)
        } else {
            0
        }
    }

    /// Get all 32 registers.
    #[wasm_bindgen]
    pub fn registers(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(&self.machine.regs.as_array()[..])
    }

    /// Read the word at `addr`, or zero outside memory.
    #[wasm_bindgen]
    pub fn memory_word(&self, addr: u32) -> u32 {
        self.machine.mem.read::<u32>(addr).unwrap_or(0)
    }

    /// Get PC, halt state, step count and registers as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl WasmMachine {
    fn reload(&mut self) -> Result<(), JsError> {
        let input = std::mem::take(&mut self.machine.console_mut().input);
        let console = BufferConsole::with_input(input);
        self.machine = Machine::new(self.config.memory_size, console);
        self.machine.load_program(self.config.load_address, &self.program)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the instruction words.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u32>, JsError> {
    assemble(source).map_err(|e| JsError::new(&format!("{}", e)))
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(raw: u32) -> String {
    disassemble_instruction(raw)
}
