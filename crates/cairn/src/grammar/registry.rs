//! Process-wide cache of analyzed grammars, keyed by definition type.
//!
//! Analysis runs at most once per [`GrammarDefinition`] type. Concurrent
//! first uses wait for the single initialization and all observe the same
//! result, successful or not.

use crate::error::GrammarErrors;
use crate::grammar::{AnalyzedGrammar, GrammarBuilder};
use crate::syntax::TokenKind;
use ahash::RandomState;
use hashbrown::HashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};

/// A grammar known by its Rust type.
///
/// # Example
///
/// ```rust
/// use cairn::grammar::{GrammarBuilder, GrammarDefinition, Production, analyzed};
/// # use cairn::syntax::TokenKind;
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Digit, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// struct Digits;
///
/// impl GrammarDefinition for Digits {
///     type Kind = Kind;
///
///     fn define() -> GrammarBuilder<Kind> {
///         GrammarBuilder::new().rule("digits", [Production::plus([Production::token(Kind::Digit)])])
///     }
/// }
///
/// let first = analyzed::<Digits>().expect("grammar is well formed");
/// let second = analyzed::<Digits>().expect("grammar is well formed");
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
pub trait GrammarDefinition: 'static {
    type Kind: TokenKind;

    fn define() -> GrammarBuilder<Self::Kind>;
}

type Analysis<K> = Result<Arc<AnalyzedGrammar<K>>, GrammarErrors>;
type Slot<K> = Arc<OnceLock<Analysis<K>>>;

/// One type-erased [`Slot`] per definition type.
type Registry = HashMap<TypeId, Arc<dyn Any + Send + Sync>, RandomState>;

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

fn slot<G: GrammarDefinition>() -> Slot<G::Kind> {
    let mut entries = REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = entries
        .entry(TypeId::of::<G>())
        .or_insert_with(|| Arc::new(OnceLock::<Analysis<G::Kind>>::new()) as Arc<dyn Any + Send + Sync>);
    match Arc::clone(entry).downcast::<OnceLock<Analysis<G::Kind>>>() {
        Ok(existing) => existing,
        // The key is the definition type, which fixes the slot type.
        Err(_) => Arc::new(OnceLock::new()),
    }
}

/// The analyzed grammar of `G`, computing it on first use.
///
/// # Errors
///
/// The grammar errors of `G`. A failed analysis is cached too, and every
/// call returns the same list.
pub fn analyzed<G: GrammarDefinition>() -> Analysis<G::Kind> {
    // The registry lock is released before analysis runs, so definitions
    // may look up other grammars.
    let slot = slot::<G>();
    slot.get_or_init(|| G::define().build()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Branch, Production};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        A,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    static DEFINED: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl GrammarDefinition for Counted {
        type Kind = TestKind;

        fn define() -> GrammarBuilder<TestKind> {
            DEFINED.fetch_add(1, Ordering::SeqCst);
            GrammarBuilder::new().rule("start", [Production::token(TestKind::A)])
        }
    }

    struct Broken;

    impl GrammarDefinition for Broken {
        type Kind = TestKind;

        fn define() -> GrammarBuilder<TestKind> {
            GrammarBuilder::new().rule(
                "start",
                [Production::choice([
                    Branch::new([Production::token(TestKind::A)]),
                    Branch::new([Production::token(TestKind::A)]),
                ])],
            )
        }
    }

    #[test]
    fn test_concurrent_first_use_analyzes_once() {
        let handles: Vec<_> = (0..8).map(|_| thread::spawn(analyzed::<Counted>)).collect();
        let grammars: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished").expect("grammar is valid"))
            .collect();
        assert_eq!(DEFINED.load(Ordering::SeqCst), 1);
        assert!(grammars.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    struct Other;

    impl GrammarDefinition for Other {
        type Kind = TestKind;

        fn define() -> GrammarBuilder<TestKind> {
            GrammarBuilder::new().rule("other", [Production::token(TestKind::A)])
        }
    }

    #[test]
    fn test_each_definition_has_its_own_entry() {
        let other = analyzed::<Other>().expect("grammar is valid");
        let counted = analyzed::<Counted>().expect("grammar is valid");
        assert!(!Arc::ptr_eq(&other, &counted));
        assert_eq!(other.entry_point(), "other");
        assert_eq!(counted.entry_point(), "start");
        assert!(Arc::ptr_eq(&other, &analyzed::<Other>().expect("grammar is valid")));
    }

    #[test]
    fn test_failures_are_cached() {
        let first = analyzed::<Broken>().expect_err("grammar is ambiguous");
        let second = analyzed::<Broken>().expect_err("grammar is ambiguous");
        assert!(first.ptr_eq(&second));
        assert_eq!(first.to_string(), second.to_string());
    }
}
