//! # confab - configuration assembly
//!
//! `confab` assembles named configuration artifacts from ordered lists of
//! fragment files contributed by multiple sources (for example the
//! packages of a dependency graph). The result is a set of portable,
//! path-independent PHP configuration files.
//!
//! ## Terms
//!
//! - **fragment**: one source tree read from one location, before merging
//! - **unit**: one logical configuration output (`web`, `params`, ...)
//!   assembled from its fragments
//! - **special unit**: `env`, `defines` or `params`; built first, their
//!   merged values are injected into every other unit
//! - **marker**: placeholder standing in for the absolute project base
//!   directory, keeps artifacts relocatable
//! - **depth**: parent directory hops between an emitted artifact and the
//!   project base directory
//!
//! ## Pipeline
//!
//! Every unit runs through three stages, see [unit::ConfigUnit]:
//!
//! 1. **load** - each fragment location is read into a [value::Value]
//!    tree by a reader picked from the file extension ([reader]).
//!    Missing fragments degrade to empty trees; a leading `?` on a
//!    location suppresses the warning. Readers receive the already built
//!    special unit values explicitly, so HCL fragments can reference
//!    `defines.*` and `params.*` in expressions.
//! 2. **build** - the fragment trees are merged in order
//!    ([merge::merge]): later fragments override earlier ones, mappings
//!    merge key by key and arrays concatenate. Ordinary units
//!    additionally receive the run's shared addition tree and the merged
//!    special unit values as implicit input behind their own fragments.
//!    Afterwards every string starting at the project root is rewritten
//!    to start with [base_dir::BASE_DIR_MARKER] instead
//!    ([base_dir::substitute]), so the merged tree no longer mentions
//!    the machine it was built on.
//! 3. **write** - the tree is rendered into a self-contained PHP file
//!    ([artifact]): a `$baseDir` assignment that walks the right number
//!    of directory levels back up to the project root, the preambles for
//!    the unit's identity and `return <literal>;`. Marker placeholders
//!    inside string literals become `$baseDir` concatenations, so the
//!    artifact reconstructs absolute paths at load time. The write is
//!    skipped when the file content is unchanged.
//!
//! [unit::Assembly] drives a whole run and enforces the one ordering
//! constraint: special units build before everything else.
pub mod artifact;
pub mod base_dir;
pub mod merge;
pub mod reader;
pub mod unit;
pub mod value;
