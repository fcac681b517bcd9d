pub mod ident;
pub mod probe;
pub mod meta;
pub mod registry;
pub mod hypertable;
pub mod materialize;
pub mod compress;
pub mod rebuild;
pub mod converge;

pub use registry::{
    AGGREGATE_REGISTRY_VERSION,
    AggregateDef,
    DerivedViewDef,
    FactTable,
    RefreshPolicy,
};

pub use converge::{
    AnalyticsStatus,
    ConvergeReport,
    converge,
    get_status,
    rebuild,
    refresh_all,
};

pub use rebuild::{
    ProgressFn,
    RebuildOutcome,
};
