use std::collections::HashMap;

use crate::ast::{Mixin, MixinCall};
use crate::diagnostics::Diagnostic;

/// Mixins registered so far in the current compile, by name.
///
/// Registration happens when the code generator reaches a `mixin`
/// declaration, so a call must come after the declaration it uses.
#[derive(Debug, Default)]
pub struct MixinTable {
    mixins: HashMap<String, Mixin>,
}

impl MixinTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mixin`; a later declaration with the same name replaces it.
    pub fn register(&mut self, mixin: &Mixin) {
        self.mixins.insert(mixin.name.clone(), mixin.clone());
    }

    pub fn resolve(&self, call: &MixinCall) -> Result<&Mixin, Diagnostic> {
        let mixin = self.mixins.get(&call.name).ok_or_else(|| {
            Diagnostic::semantic(
                "E2005",
                format!("undefined mixin `{}`", call.name),
                call.position.clone(),
            )
        })?;
        if mixin.params.len() != call.args.len() {
            return Err(Diagnostic::semantic(
                "E2006",
                format!(
                    "mixin `{}` takes {} argument(s) but {} were given",
                    call.name,
                    mixin.params.len(),
                    call.args.len()
                ),
                call.position.clone(),
            ));
        }
        Ok(mixin)
    }

    pub fn clear(&mut self) {
        self.mixins.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Block;
    use crate::diagnostics::SourcePosition;

    fn mixin(name: &str, params: &[&str]) -> Mixin {
        Mixin {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            block: Block::default(),
            position: SourcePosition::default(),
        }
    }

    fn call(name: &str, args: &[&str]) -> MixinCall {
        MixinCall {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            position: SourcePosition::new(7, 1, 5),
        }
    }

    #[test]
    fn resolves_registered_mixins() {
        let mut table = MixinTable::new();
        table.register(&mixin("card", &["$title"]));
        let found = table.resolve(&call("card", &["\"x\""])).expect("registered");
        assert_eq!(found.params, ["$title"]);
    }

    #[test]
    fn undefined_and_arity_errors() {
        let mut table = MixinTable::new();
        let err = table.resolve(&call("card", &[])).expect_err("undefined");
        assert_eq!(err.code, "E2005");
        assert_eq!(err.position.line, 7);

        table.register(&mixin("card", &["$a", "$b"]));
        let err = table.resolve(&call("card", &["1"])).expect_err("arity");
        assert_eq!(err.code, "E2006");
        assert_eq!(
            err.message,
            "mixin `card` takes 2 argument(s) but 1 were given"
        );

        table.clear();
        assert!(table.resolve(&call("card", &["1", "2"])).is_err());
    }
}
