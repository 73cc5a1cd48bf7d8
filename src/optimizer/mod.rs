// Optimization engine: formation catalog, lexicographic objective keys,
// squad construction, XI arrangement, and transfer search.

pub mod arrange;
pub mod formation;
pub mod lexico;
pub mod squad;
pub mod transfer;
