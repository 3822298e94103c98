//! Interned entries owned by the adapter.

/// A class, interned by its dot-separated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub id: u32,
    pub name: String,
    /// First source file reported for any method of this class.
    pub source_name: Option<String>,
    pub defined: bool,
}

impl ClassEntry {
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            source_name: None,
            defined: false,
        }
    }
}

/// A method, interned by its capture-time address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub id: u32,
    pub address: u32,
    pub name: String,
    pub signature: String,
    pub class_id: u32,
    pub source_line: Option<u32>,
    pub defined: bool,
}

/// One active call on a thread's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    pub method_id: u32,
    pub ticket: u32,
}

/// A traced thread and its live call stack.
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub id: u32,
    pub name: String,
    pub started: bool,
    stack: Vec<CallFrame>,
    next_ticket: u32,
}

impl ThreadEntry {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            started: false,
            stack: Vec::new(),
            next_ticket: 0,
        }
    }

    /// Pushes a call with a fresh ticket. Tickets are never reused.
    pub fn push_call(&mut self, method_id: u32) -> CallFrame {
        let frame = CallFrame {
            method_id,
            ticket: self.next_ticket,
        };
        self.next_ticket += 1;
        self.stack.push(frame);
        frame
    }

    pub fn current_call(&self) -> Option<&CallFrame> {
        self.stack.last()
    }

    pub fn pop_call(&mut self) -> Option<CallFrame> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
