//! Stack machine.
use crate::{
    bytecode::Op,
    error::{RuntimeError, VmResult},
    value::Value,
};

/// A frame-based stack machine.
///
/// Code and memory survive across `run` calls so that units compiled
/// later can call into code assembled earlier. The frame pointer marks
/// the boundary between the current frame's saved bookkeeping slots
/// and its live locals and arguments.
#[derive(Default)]
pub struct Machine {
    code: Vec<Op>,
    mem: Vec<Value>,
    ip: usize,
    fp: usize,
}

impl Machine {
    pub fn new() -> Self {
        Machine::default()
    }

    /// Appends a block of instructions, returning its entry offset.
    pub fn push_code(&mut self, code: Vec<Op>) -> usize {
        let entry = self.code.len();
        self.code.extend(code);
        entry
    }

    #[inline]
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn set_ip(&mut self, ip: usize) {
        self.ip = ip;
    }

    /// Pushes a value onto the stack, returning its address.
    pub fn push(&mut self, value: Value) -> usize {
        self.mem.push(value);
        self.mem.len() - 1
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.mem.pop()
    }

    #[inline]
    pub fn stack(&self) -> &[Value] {
        &self.mem
    }

    /// Runs from the current instruction pointer until `Exit`.
    ///
    /// Execution is run-to-completion: a non-terminating program never
    /// returns. Bounding execution is the caller's concern.
    pub fn run(&mut self) -> VmResult<()> {
        loop {
            let sp = self.mem.len(); // stack pointer
            let op = match self.code.get(self.ip) {
                Some(op) => *op,
                None => return Err(RuntimeError::IpOutOfRange { ip: self.ip as i64 }),
            };
            self.trace(sp, op);

            match op {
                Op::Nop => {}
                Op::Add => {
                    let b = self.pop_int("Add")?;
                    let a = self.pop_int("Add")?;
                    self.mem.push(Value::Int(a.wrapping_add(b)));
                }
                Op::Sub => {
                    let b = self.pop_int("Sub")?;
                    let a = self.pop_int("Sub")?;
                    self.mem.push(Value::Int(a.wrapping_sub(b)));
                }
                Op::Lower => {
                    let b = self.pop_int("Lower")?;
                    let a = self.pop_int("Lower")?;
                    self.mem.push(Value::Bool(a < b));
                }
                Op::Push(n) => self.mem.push(Value::Int(n)),
                Op::Pop => {
                    self.pop_value("Pop")?;
                }
                Op::Dup(addr) => {
                    let value = self
                        .mem
                        .get(addr)
                        .cloned()
                        .ok_or(RuntimeError::BadAddress { op: "Dup", addr: addr as i64 })?;
                    self.mem.push(value);
                }
                Op::Fdup(offset) => {
                    let addr = self.frame_addr(offset, "Fdup")?;
                    let value = self.mem[addr].clone();
                    self.mem.push(value);
                }
                Op::Assign => {
                    let value = self.pop_value("Assign")?;
                    let addr = self.pop_int("Assign")?;
                    if addr < 0 || addr as usize >= self.mem.len() {
                        return Err(RuntimeError::BadAddress { op: "Assign", addr });
                    }
                    self.mem[addr as usize] = value;
                }
                Op::Enter => {
                    self.mem.push(Value::Int(self.fp as i64));
                    self.fp = sp + 1;
                }
                Op::Exit => return Ok(()),
                Op::Jump(delta) => {
                    self.jump(delta)?;
                    continue;
                }
                Op::JumpTrue(delta) => {
                    if self.pop_bool("JumpTrue")? {
                        self.jump(delta)?;
                        continue;
                    }
                }
                Op::Call(delta) => {
                    self.mem.push(Value::Int(self.ip as i64 + 1));
                    self.jump(delta)?;
                    continue;
                }
                Op::CallX(argc) => {
                    if sp < argc + 1 {
                        return Err(RuntimeError::StackUnderflow { op: "CallX" });
                    }
                    // First argument is on top of the stack.
                    let mut args = Vec::with_capacity(argc);
                    for i in 0..argc {
                        args.push(self.mem[sp - 1 - i].clone());
                    }
                    let func = match &self.mem[sp - argc - 1] {
                        Value::Native(func) => func.clone(),
                        _ => return Err(RuntimeError::NotCallable),
                    };
                    self.mem.truncate(sp - argc - 1);
                    let results = func.invoke(&args);
                    self.mem.extend(results);
                }
                Op::Return { num_out, num_in } => {
                    if self.fp < num_in + 2 || self.fp > sp || sp < self.fp + num_out - 2 {
                        return Err(RuntimeError::StackUnderflow { op: "Return" });
                    }
                    let ret = self.saved_slot(self.fp - 2)?;
                    let old_fp = self.saved_slot(self.fp - 1)?;
                    let results = self.mem.split_off(sp - num_out);
                    self.mem.truncate(self.fp - 2 - num_in);
                    self.mem.extend(results);
                    self.ip = ret;
                    self.fp = old_fp;
                    continue;
                }
            }

            self.ip += 1;
        }
    }

    fn pop_value(&mut self, op: &'static str) -> VmResult<Value> {
        self.mem.pop().ok_or(RuntimeError::StackUnderflow { op })
    }

    fn pop_int(&mut self, op: &'static str) -> VmResult<i64> {
        match self.pop_value(op)? {
            Value::Int(n) => Ok(n),
            _ => Err(RuntimeError::TypeMismatch { op, expected: "int" }),
        }
    }

    fn pop_bool(&mut self, op: &'static str) -> VmResult<bool> {
        match self.pop_value(op)? {
            Value::Bool(b) => Ok(b),
            _ => Err(RuntimeError::TypeMismatch { op, expected: "bool" }),
        }
    }

    /// Resolves a frame-relative offset to a concrete stack index.
    fn frame_addr(&self, offset: i64, op: &'static str) -> VmResult<usize> {
        let addr = self.fp as i64 - 1 + offset;
        if addr < 0 || addr as usize >= self.mem.len() {
            return Err(RuntimeError::BadAddress { op, addr });
        }
        Ok(addr as usize)
    }

    /// Reads a return address or frame pointer saved in a frame slot.
    fn saved_slot(&self, addr: usize) -> VmResult<usize> {
        match self.mem[addr] {
            Value::Int(n) if n >= 0 => Ok(n as usize),
            _ => Err(RuntimeError::TypeMismatch { op: "Return", expected: "int" }),
        }
    }

    fn jump(&mut self, delta: i64) -> VmResult<()> {
        let target = self.ip as i64 + delta;
        if target < 0 {
            return Err(RuntimeError::IpOutOfRange { ip: target });
        }
        self.ip = target as usize;
        Ok(())
    }

    #[cfg(feature = "op_trace")]
    fn trace(&self, sp: usize, op: Op) {
        println!(
            "ip:{:<4} sp:{:<4} fp:{:<4} op:[{:<14}] mem:{:?}",
            self.ip,
            sp,
            self.fp,
            op.to_string(),
            self.mem
        );
    }

    #[cfg(not(feature = "op_trace"))]
    fn trace(&self, _: usize, _: Op) {}
}
