use std::collections::HashMap;

/// What a declaration allows for one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarState {
    pub reassignable: bool,
    pub editable: bool,
    /// Count of trailing `!` on the declaration.
    pub priority: usize,
}

/// Declarations seen so far in one unit. Shadowing declarations stack up; nothing is removed.
#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, Vec<VarState>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, state: VarState) {
        self.variables.entry(name.to_string()).or_default().push(state);
    }

    pub fn latest(&self, name: &str) -> Option<&VarState> {
        self.variables.get(name).and_then(|states| states.last())
    }
}
