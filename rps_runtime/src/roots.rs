//! Root objects and the predefined object graph.
//!
//! Root objects are always live: the collector starts marking from them.
//! The predefined objects are the classes, symbols, space and sets every
//! heap starts with. They keep their historical oids, are installed once on
//! first access to [`predefined()`], and are all registered as roots.
//!
//! ```text
//!   value ◄── object ◄── class, symbol, space, mutable_set, mutable_vector,
//!     ▲                  function ◄── core_function, contributor_to_RefPerSys
//!     └── int, string, double, set, tuple, closure
//! ```

use crate::object::{MagicGetterFn, ObjectRef, ObjectZone};
use crate::oid::Oid;
use crate::payload::{ClassInfo, SetOb, SpaceInfo};
use crate::symbols::symbol_table;
use crate::trace::Tracer;
use crate::types::SetZone;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

// =============================================================================
// Root Objects
// =============================================================================

/// The set of objects the collector always keeps.
pub struct RootObjects {
    roots: Mutex<BTreeSet<ObjectRef>>,
}

impl RootObjects {
    /// Create an empty root set.
    pub fn new() -> Self {
        Self {
            roots: Mutex::new(BTreeSet::new()),
        }
    }

    /// Make `ob` a root. Returns false when it already was one.
    pub fn add_root_object(&self, ob: &ObjectRef) -> bool {
        self.roots.lock().insert(ob.clone())
    }

    /// Stop treating `ob` as a root. Returns false when it was not one.
    pub fn remove_root_object(&self, ob: &ObjectRef) -> bool {
        self.roots.lock().remove(ob)
    }

    /// Whether `ob` is a root.
    pub fn is_root_object(&self, ob: &ObjectRef) -> bool {
        self.roots.lock().contains(ob)
    }

    /// All roots as a set value.
    pub fn set_root_objects(&self) -> Arc<SetZone> {
        SetZone::make(self.roots.lock().iter().cloned())
    }

    /// Number of roots.
    pub fn nb_root_objects(&self) -> usize {
        self.roots.lock().len()
    }

    /// Call `f` on each root, in oid order, without holding the lock.
    pub fn each_root_object(&self, mut f: impl FnMut(&ObjectRef)) {
        let snapshot: Vec<ObjectRef> = self.roots.lock().iter().cloned().collect();
        for ob in &snapshot {
            f(ob);
        }
    }

    /// Report every root to `tracer`. Returns how many.
    pub fn gc_mark_roots(&self, tracer: &mut dyn Tracer) -> usize {
        let mut count = 0;
        self.each_root_object(|ob| {
            tracer.trace_object(ob);
            count += 1;
        });
        count
    }
}

impl Default for RootObjects {
    fn default() -> Self {
        Self::new()
    }
}

static ROOT_OBJECTS: OnceLock<RootObjects> = OnceLock::new();

/// Get the process-wide root set.
pub fn root_objects() -> &'static RootObjects {
    ROOT_OBJECTS.get_or_init(RootObjects::new)
}

// =============================================================================
// Predefined Objects
// =============================================================================

#[derive(Clone, Copy)]
enum Kind {
    Class { sup: Option<Ix>, symbol: Option<Ix> },
    Symbol,
    Space,
    MutableSet,
    Plain,
}

struct Entry {
    oid: Oid,
    name: &'static str,
    kind: Kind,
}

macro_rules! predefined_objects {
    ($( $ix:ident $accessor:ident $oid:literal $name:literal $kind:expr; )*) => {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Ix {
            $( $ix, )*
        }

        const TABLE: &[Entry] = &[
            $( Entry { oid: Oid::from_static($oid), name: $name, kind: $kind }, )*
        ];

        impl Predefined {
            $(
                #[doc = concat!("The predefined `", $name, "` object, `", $oid, "`.")]
                #[inline]
                pub fn $accessor(&self) -> &ObjectRef {
                    &self.objects[Ix::$ix as usize]
                }
            )*
        }
    };
}

const fn class(sup: Ix) -> Kind {
    Kind::Class { sup: Some(sup), symbol: None }
}

const fn named_class(sup: Ix, symbol: Ix) -> Kind {
    Kind::Class { sup: Some(sup), symbol: Some(symbol) }
}

predefined_objects! {
    ValueClass value_class "_6XLY6QfcDre02922jz" "value" Kind::Class { sup: None, symbol: None };
    ObjectClass object_class "_5yhJGgxLwLp00X0xEQ" "object" named_class(Ix::ValueClass, Ix::ObjectSymbol);
    ClassClass class_class "_41OFI3r0S1t03qdB2E" "class" named_class(Ix::ObjectClass, Ix::ClassSymbol);
    SymbolClass symbol_class "_36I1BY2NetN03WjrOv" "symbol" named_class(Ix::ObjectClass, Ix::SymbolSymbol);
    SpaceClass space_class "_2i66FFjmS7n03HNNBx" "space" named_class(Ix::ObjectClass, Ix::SpaceSymbol);
    MutableSetClass mutable_set_class "_0J1C39JoZiv03qA2HA" "mutable_set" class(Ix::ObjectClass);
    MutableVectorClass mutable_vector_class "_8YknAApDQiF04BDe3W" "mutable_vector" class(Ix::ObjectClass);
    SetClass set_class "_6JYterg6iAu00cV9Ye" "set" class(Ix::ValueClass);
    TupleClass tuple_class "_6NVM7sMcITg01ug5TC" "tuple" class(Ix::ValueClass);
    StringClass string_class "_62LTwxwKpQ802SsmjE" "string" class(Ix::ValueClass);
    IntClass int_class "_2A2mrPpR3Qf03p6o5b" "int" class(Ix::ValueClass);
    DoubleClass double_class "_98sc8kSOXV003i86w5" "double" class(Ix::ValueClass);
    ClosureClass closure_class "_4jISxMJ4PYU0050nUl" "closure" class(Ix::ValueClass);
    FunctionClass function_class "_9BnrMLXUhfG00llx8X" "function" class(Ix::ObjectClass);
    CoreFunctionClass core_function_class "_9Gz1oNPCnkB00I6VRS" "core_function" class(Ix::FunctionClass);
    ContributorClass contributor_class "_5CYWxcChKN002rw1fI" "contributor_to_RefPerSys" class(Ix::ObjectClass);
    ObjectSymbol object_symbol "_7X9eGs8601M021nMue" "object" Kind::Symbol;
    ClassSymbol class_symbol "_6fmq7pZkmNd03UyPuO" "class" Kind::Symbol;
    SymbolSymbol symbol_symbol "_3Q3hJsSgCDN03GTYW5" "symbol" Kind::Symbol;
    SpaceSymbol space_symbol "_9uwZtDshW4401x6MsY" "space" Kind::Symbol;
    EmailSymbol email_symbol "_0D6zqQNe4eC02bjfGs" "email" Kind::Symbol;
    HomePageSymbol home_page_symbol "_0LbCts6NacB03SMXz4" "home_page" Kind::Symbol;
    GitIdSymbol git_id_symbol "_0XMNvzdABUM03Bj7WP" "git_id" Kind::Symbol;
    OurContributorsSymbol our_contributors_symbol "_1DBiKRl70P304DEMoR" "our_contributors" Kind::Symbol;
    SetOfCoreFunctionsSymbol set_of_core_functions_symbol "_2SRhV7RJt3B01yArR6" "set_of_core_functions" Kind::Symbol;
    FirstNameSymbol first_name_symbol "_3N8vZ2Cw62z024XxCg" "first_name" Kind::Symbol;
    LastNameSymbol last_name_symbol "_6QAanFi9yLx00spBST" "last_name" Kind::Symbol;
    MessageSendingSymbol message_sending_symbol "_5yQcFbU0seU018B48Z" "message_sending" Kind::Symbol;
    ClosureForMethodSelectorSymbol closure_for_method_selector_symbol "_6JbWqOsjX5T03M1eGM" "closure_for_method_selector" Kind::Symbol;
    InitialSpace initial_space "_8J6vNYtP5E800eCr5q" "initial space" Kind::Space;
    FirstMutableSet first_mutable_set "_1wihX3eWD9o00QnxUX" "first mutable set" Kind::MutableSet;
    SecondMutableSet second_mutable_set "_6gxiw0snqrX01tZWW9" "second mutable set" Kind::MutableSet;
    AgendaObject agenda_object "_1aGtWm38Vw701jDhZn" "agenda" Kind::Plain;
}

/// The predefined objects, in installation order.
pub struct Predefined {
    objects: Box<[ObjectRef]>,
}

impl Predefined {
    /// Number of predefined objects, the agenda object included.
    pub const COUNT: usize = TABLE.len();

    /// All predefined objects.
    pub fn all(&self) -> &[ObjectRef] {
        &self.objects
    }

    /// Whether `ob` is one of the predefined objects.
    pub fn is_predefined(&self, ob: &ObjectRef) -> bool {
        self.objects.iter().any(|p| p.ptr_eq(ob))
    }

    // Must not call `predefined()`, `class()`, `is_class()` or `put_class()`:
    // the cell is still being initialized.
    fn install() -> Self {
        let objects: Box<[ObjectRef]> = TABLE.iter().map(|entry| ObjectZone::make_or_find(entry.oid)).collect();
        let at = |ix: Ix| &objects[ix as usize];

        for (entry, ob) in TABLE.iter().zip(objects.iter()) {
            let installed = match entry.kind {
                Kind::Class { sup, symbol } => {
                    ob.set_class_unchecked(at(Ix::ClassClass));
                    let mut info = ClassInfo::new(sup.map(|s| at(s).clone()));
                    info.put_symbol(symbol.map(|s| at(s).clone()));
                    ob.put_payload(Box::new(info))
                }
                Kind::Symbol => {
                    ob.set_class_unchecked(at(Ix::SymbolClass));
                    symbol_table().register_strong_name(entry.name, ob).map(|_| ())
                }
                Kind::Space => {
                    ob.set_class_unchecked(at(Ix::SpaceClass));
                    ob.put_payload(Box::new(SpaceInfo::new(Some(entry.name))))
                }
                Kind::MutableSet => {
                    ob.set_class_unchecked(at(Ix::MutableSetClass));
                    ob.put_payload(Box::new(SetOb::new()))
                }
                Kind::Plain => {
                    ob.set_class_unchecked(at(Ix::ObjectClass));
                    Ok(())
                }
            };
            if let Err(err) = installed {
                log::warn!("predefined {} {}: {err}", entry.name, entry.oid);
            }
            ob.put_space(Some(at(Ix::InitialSpace)));
            root_objects().add_root_object(ob);
        }

        let class_getter: MagicGetterFn = Arc::new(|owner: &ObjectZone, _key: &ObjectRef| Ok(owner.class().as_value()));
        at(Ix::ClassSymbol).put_magic_getter(Some(class_getter));

        log::debug!("installed {} predefined objects", objects.len());
        Self { objects }
    }
}

static PREDEFINED: OnceLock<Predefined> = OnceLock::new();

/// Get the predefined objects, installing them on first use.
pub fn predefined() -> &'static Predefined {
    PREDEFINED.get_or_init(Predefined::install)
}
