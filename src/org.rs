//! Organization catalog: branch → department → position.
//!
//! Loaded once from YAML and used to validate template keys and label them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{FormError, FormResult};
use crate::types::TemplateKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgCatalog {
    #[serde(default)]
    pub branches: Vec<Branch>,
}

/// One full key with its display label, for "apply to all" imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgCombination {
    pub key: String,
    pub branch_id: String,
    pub department_id: String,
    pub position_id: String,
    pub label: String,
}

impl OrgCatalog {
    pub fn load(path: impl AsRef<Path>) -> FormResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> FormResult<Self> {
        let catalog: OrgCatalog = serde_yaml::from_str(yaml)?;
        catalog.check_ids()?;
        Ok(catalog)
    }

    /// Ids must be non-empty, free of the key separator and unique among siblings.
    fn check_ids(&self) -> FormResult<()> {
        fn check<'a>(level: &str, ids: impl Iterator<Item = &'a str>) -> FormResult<()> {
            let mut seen = HashSet::new();
            for id in ids {
                if id.trim().is_empty() || id.contains(TemplateKey::SEPARATOR) {
                    return Err(FormError::InvalidKey(format!(
                        "{level} id '{id}' is empty or contains '{}'",
                        TemplateKey::SEPARATOR
                    )));
                }
                if !seen.insert(id) {
                    return Err(FormError::InvalidKey(format!("duplicate {level} id '{id}'")));
                }
            }
            Ok(())
        }

        check("branch", self.branches.iter().map(|b| b.id.as_str()))?;
        for branch in &self.branches {
            check("department", branch.departments.iter().map(|d| d.id.as_str()))?;
            for dept in &branch.departments {
                check("position", dept.positions.iter().map(|p| p.id.as_str()))?;
            }
        }
        Ok(())
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == branch_id)
    }

    pub fn department(&self, branch_id: &str, department_id: &str) -> Option<&Department> {
        self.branch(branch_id)?
            .departments
            .iter()
            .find(|d| d.id == department_id)
    }

    pub fn position(
        &self,
        branch_id: &str,
        department_id: &str,
        position_id: &str,
    ) -> Option<&Position> {
        self.department(branch_id, department_id)?
            .positions
            .iter()
            .find(|p| p.id == position_id)
    }

    /// Each key component must exist under its parent.
    pub fn validate(&self, key: &TemplateKey) -> FormResult<()> {
        if self.branch(&key.branch_id).is_none() {
            return Err(FormError::UnknownOrgUnit(format!(
                "branch '{}'",
                key.branch_id
            )));
        }
        if self.department(&key.branch_id, &key.department_id).is_none() {
            return Err(FormError::UnknownOrgUnit(format!(
                "department '{}' in branch '{}'",
                key.department_id, key.branch_id
            )));
        }
        if self
            .position(&key.branch_id, &key.department_id, &key.position_id)
            .is_none()
        {
            return Err(FormError::UnknownOrgUnit(format!(
                "position '{}' in department '{}'",
                key.position_id, key.department_id
            )));
        }
        Ok(())
    }

    /// "Branch / Department / Position", falling back to ids for unknown units.
    pub fn label(&self, key: &TemplateKey) -> String {
        let branch = self
            .branch(&key.branch_id)
            .map_or(key.branch_id.as_str(), |b| b.name.as_str());
        let department = self
            .department(&key.branch_id, &key.department_id)
            .map_or(key.department_id.as_str(), |d| d.name.as_str());
        let position = self
            .position(&key.branch_id, &key.department_id, &key.position_id)
            .map_or(key.position_id.as_str(), |p| p.name.as_str());
        format!("{branch} / {department} / {position}")
    }

    pub fn combinations(&self) -> Vec<OrgCombination> {
        let mut out = Vec::new();
        for branch in &self.branches {
            for dept in &branch.departments {
                for pos in &dept.positions {
                    out.push(OrgCombination {
                        key: format!(
                            "{}{sep}{}{sep}{}",
                            branch.id,
                            dept.id,
                            pos.id,
                            sep = TemplateKey::SEPARATOR
                        ),
                        branch_id: branch.id.clone(),
                        department_id: dept.id.clone(),
                        position_id: pos.id.clone(),
                        label: format!("{} / {} / {}", branch.name, dept.name, pos.name),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
branches:
  - id: hn
    name: Hà Nội
    departments:
      - id: sales
        name: Kinh doanh
        positions:
          - id: staff
            name: Nhân viên
          - id: lead
            name: Trưởng nhóm
  - id: hcm
    name: Hồ Chí Minh
    departments:
      - id: ops
        name: Vận hành
        positions:
          - id: staff
            name: Nhân viên
"#;

    fn catalog() -> OrgCatalog {
        OrgCatalog::from_yaml_str(CATALOG).unwrap()
    }

    #[test]
    fn test_lookup() {
        let org = catalog();
        assert_eq!(org.branch("hn").unwrap().name, "Hà Nội");
        assert_eq!(org.department("hcm", "ops").unwrap().name, "Vận hành");
        assert!(org.department("hn", "ops").is_none());
        assert_eq!(org.position("hn", "sales", "lead").unwrap().name, "Trưởng nhóm");
    }

    #[test]
    fn test_validate() {
        let org = catalog();
        assert!(org.validate(&TemplateKey::parse("hn|sales|staff").unwrap()).is_ok());
        assert!(matches!(
            org.validate(&TemplateKey::parse("hn|ops|staff").unwrap()),
            Err(FormError::UnknownOrgUnit(_))
        ));
        assert!(matches!(
            org.validate(&TemplateKey::parse("dn|sales|staff").unwrap()),
            Err(FormError::UnknownOrgUnit(_))
        ));
        assert!(matches!(
            org.validate(&TemplateKey::parse("hn|sales|boss").unwrap()),
            Err(FormError::UnknownOrgUnit(_))
        ));
    }

    #[test]
    fn test_label_and_combinations() {
        let org = catalog();
        let key = TemplateKey::parse("hn|sales|lead").unwrap();
        assert_eq!(org.label(&key), "Hà Nội / Kinh doanh / Trưởng nhóm");
        assert_eq!(
            org.label(&TemplateKey::parse("x|y|z").unwrap()),
            "x / y / z"
        );

        let combos = org.combinations();
        let keys: Vec<&str> = combos.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["hn|sales|staff", "hn|sales|lead", "hcm|ops|staff"]);
        assert_eq!(combos[2].label, "Hồ Chí Minh / Vận hành / Nhân viên");
    }

    #[test]
    fn test_rejects_bad_ids() {
        let dup = "branches:\n  - {id: a, name: A}\n  - {id: a, name: B}\n";
        assert!(matches!(
            OrgCatalog::from_yaml_str(dup),
            Err(FormError::InvalidKey(_))
        ));
        let pipe = "branches:\n  - {id: 'a|b', name: A}\n";
        assert!(OrgCatalog::from_yaml_str(pipe).is_err());
        assert!(matches!(
            OrgCatalog::from_yaml_str("branches: [1, 2"),
            Err(FormError::Yaml(_))
        ));
    }
}
