use crate::{Domain, DomainId, DomainStore as _, Error, Hypervisor, HypervisorControl as _};

/// Prefix of the `vm` store entry in front of the UUID.
const VM_PATH_PREFIX: &str = "/vm/";

/// Enumerates domains and resolves stable identifiers to domain IDs.
///
/// Every query takes a fresh snapshot. Domain IDs are volatile, so nothing
/// is cached between calls.
pub struct DomainDirectory<'a, H>
where
    H: Hypervisor,
{
    hypervisor: &'a H,
    max_domains: usize,
}

impl<'a, H> DomainDirectory<'a, H>
where
    H: Hypervisor,
{
    /// Default upper bound on the number of enumerated domains.
    pub const DEFAULT_MAX_DOMAINS: usize = 1024;

    /// Creates a directory backed by `hypervisor`.
    pub fn new(hypervisor: &'a H) -> Self {
        Self {
            hypervisor,
            max_domains: Self::DEFAULT_MAX_DOMAINS,
        }
    }

    /// Sets the upper bound on the number of enumerated domains.
    pub fn with_max_domains(self, max_domains: usize) -> Self {
        Self {
            max_domains,
            ..self
        }
    }

    /// Takes a snapshot of the currently known domains.
    ///
    /// Names and UUIDs are looked up in the domain store; entries missing
    /// from the store leave the corresponding field empty. Fails only if
    /// the control interface or the store cannot be reached.
    pub fn snapshot(&self) -> Result<Vec<Domain>, Error> {
        let control = self.hypervisor.control()?;
        let store = self.hypervisor.store()?;

        let infos = control.domain_info_list(DomainId(0), self.max_domains)?;
        tracing::debug!(count = infos.len(), "domain snapshot");

        Ok(infos
            .into_iter()
            .map(|info| {
                let name = store.read(&store_path(info.id, "name"));
                let uuid = store
                    .read(&store_path(info.id, "vm"))
                    .map(|vm| uuid_from_vm_path(&vm).to_owned());

                Domain {
                    id: info.id,
                    flags: info.flags,
                    uuid,
                    name,
                }
            })
            .collect())
    }

    /// Resolves a UUID to the current domain ID.
    ///
    /// The match is exact and case-sensitive.
    pub fn find_by_uuid(&self, uuid: &str) -> Result<DomainId, Error> {
        if uuid.is_empty() {
            return Err(Error::InvalidArgument("uuid"));
        }

        self.snapshot()?
            .into_iter()
            .find(|domain| domain.uuid.as_deref() == Some(uuid))
            .map(|domain| domain.id)
            .ok_or_else(|| Error::UuidNotFound(uuid.to_owned()))
    }

    /// Resolves a display name to the current domain ID.
    pub fn find_by_name(&self, name: &str) -> Result<DomainId, Error> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("name"));
        }

        self.snapshot()?
            .into_iter()
            .find(|domain| domain.name.as_deref() == Some(name))
            .map(|domain| domain.id)
            .ok_or_else(|| Error::NameNotFound(name.to_owned()))
    }
}

/// Returns the store path of a per-domain key.
pub(crate) fn store_path(domain: DomainId, key: &str) -> String {
    format!("/local/domain/{domain}/{key}")
}

/// Extracts the UUID from a `vm` store value (`/vm/<uuid>`).
///
/// A value without the prefix is taken as is.
pub(crate) fn uuid_from_vm_path(vm: &str) -> &str {
    vm.strip_prefix(VM_PATH_PREFIX).unwrap_or(vm)
}
