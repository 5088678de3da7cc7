/* ************************************************************************ **
** This file is part of rsp2, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of rsp2 is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

use crate::config::Style;

use enum_map::Enum;
use std::fmt;

/// A kind of interaction that has its own force style, and thus its own totals.
///
/// The declaration order is the order in which the host evaluates the categories
/// within one force computation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Enum)]
pub enum Category {
    Pair,
    Bond,
    Angle,
    Dihedral,
    Improper,
    KSpace,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Pair,
        Category::Bond,
        Category::Angle,
        Category::Dihedral,
        Category::Improper,
        Category::KSpace,
    ];

    /// Whether the global virial may be computed as `Σ x ⊗ f`.
    pub fn supports_fdotr(self) -> bool { self == Category::Pair }

    /// The last of the given categories in evaluation order.
    pub fn last_of(categories: impl IntoIterator<Item=Category>) -> Option<Category> {
        categories.into_iter().max()
    }
}

impl From<Style> for Category {
    fn from(style: Style) -> Self {
        match style {
            Style::Pair => Category::Pair,
            Style::Bond => Category::Bond,
            Style::Angle => Category::Angle,
            Style::Dihedral => Category::Dihedral,
            Style::Improper => Category::Improper,
            Style::Kspace => Category::KSpace,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Category::Pair => "pair",
            Category::Bond => "bond",
            Category::Angle => "angle",
            Category::Dihedral => "dihedral",
            Category::Improper => "improper",
            Category::KSpace => "kspace",
        })
    }
}

#[test]
fn last_follows_evaluation_order() {
    use Category::*;
    assert_eq!(Category::last_of(vec![Dihedral, Pair, Bond]), Some(Dihedral));
    assert_eq!(Category::last_of(vec![KSpace, Pair]), Some(KSpace));
    assert_eq!(Category::last_of(vec![]), None);
    assert_eq!(Category::last_of(Category::ALL.iter().cloned()), Some(KSpace));
}
