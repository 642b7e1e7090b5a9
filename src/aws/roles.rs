use crate::constants::AWS_ROLE_ATTRIBUTE;
use crate::error::{Error, Result};
use crate::saml::SamlResponse;

/// AWS IAM role granted by the SAML assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRole {
    pub name: String,
    pub role_arn: String,
    pub principal_arn: String,
}

/// Roles offered by a SAML assertion; never empty.
#[derive(Debug, Clone)]
pub enum AvailableRoles {
    /// Exactly one role, selected without a name
    Single(IamRole),
    /// Several roles, a role name is required
    Multiple(Vec<IamRole>),
}

impl AvailableRoles {
    pub fn from_saml_response(saml_response: &SamlResponse) -> Result<Self> {
        let role_values = saml_response.get_attribute_values(AWS_ROLE_ATTRIBUTE)?;
        let mut roles = role_values
            .iter()
            .map(|value| IamRole::parse_arn_pair(value))
            .collect::<Result<Vec<_>>>()?;

        match roles.len() {
            0 => Err(Error::decode(format!(
                "assertion has no {AWS_ROLE_ATTRIBUTE} attribute"
            ))),
            1 => Ok(AvailableRoles::Single(roles.remove(0))),
            _ => Ok(AvailableRoles::Multiple(roles)),
        }
    }

    /// Pick the role to assume. `role_name` matches the last path segment of
    /// the role ARN.
    pub fn assume(self, role_name: Option<&str>) -> Result<IamRole> {
        let available = self.role_names().join(", ");

        match self {
            AvailableRoles::Single(role) => match role_name {
                Some(name) if role.name != name => Err(Error::RoleSelection(format!(
                    "Specified role '{}' does not match the only available role '{}'",
                    name, role.name
                ))),
                _ => Ok(role),
            },
            AvailableRoles::Multiple(roles) => match role_name {
                Some(name) => roles.into_iter().find(|r| r.name == name).ok_or_else(|| {
                    Error::RoleSelection(format!(
                        "Role '{name}' not found. Available roles: {available}"
                    ))
                }),
                None => Err(Error::RoleSelection(format!(
                    "Multiple roles available. Please specify one with --role: {available}"
                ))),
            },
        }
    }

    pub fn role_names(&self) -> Vec<&str> {
        match self {
            AvailableRoles::Single(role) => vec![role.name.as_str()],
            AvailableRoles::Multiple(roles) => roles.iter().map(|r| r.name.as_str()).collect(),
        }
    }
}

impl IamRole {
    /// Parse a `PrincipalARN,RoleARN` attribute value. The reversed order is
    /// accepted when the first ARN is the role.
    fn parse_arn_pair(arn_pair: &str) -> Result<Self> {
        let parts: Vec<&str> = arn_pair.split(',').map(str::trim).collect();
        let [first, second] = parts.as_slice() else {
            return Err(Error::decode(format!(
                "role attribute value must be 'PrincipalARN,RoleARN', got '{arn_pair}'"
            )));
        };

        if first.is_empty() || second.is_empty() {
            return Err(Error::decode(format!(
                "role attribute value has an empty ARN: '{arn_pair}'"
            )));
        }

        let (principal_arn, role_arn) = if first.contains(":role/") && !second.contains(":role/")
        {
            (second.to_string(), first.to_string())
        } else {
            (first.to_string(), second.to_string())
        };

        // arn:aws:iam::123456789012:role/path/RoleName
        let name = role_arn
            .rsplit('/')
            .next()
            .map_or_else(|| "UnknownRole".to_string(), String::from);

        Ok(IamRole {
            name,
            role_arn,
            principal_arn,
        })
    }
}
