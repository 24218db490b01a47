pub use anyhow::{ensure, format_err, Context as _, Error, Result};
pub use approx::abs_diff_eq;
pub use bbox::{prelude::*, CyCxHW, HW, TLHW};
pub use getset::Getters;
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::{iproduct, izip, Itertools as _};
pub use log::{debug, info, warn};
pub use ndarray::{Array2, Array4};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use rayon::prelude::*;
pub use serde::{Deserialize, Deserializer, Serialize};
pub use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};
