//! The flag check itself.
//!
//! 1. pick the model whose flags the guest should see
//! 2. read that model's register flags from the dump
//! 3. read the guest's flags
//! 4. build the expected set from the boot request
//! 5. with `check`, make sure QEMU warned about every lacking flag
//! 6. compare guest against expected

use tracing::{debug, info, info_span, warn};

use crate::cpuinfo::HostCpu;
use crate::dump::ModelDump;
use crate::error::{Error, Result};
use crate::extra::ExtraFlags;
use crate::flag::FlagSet;
use crate::host::{host_cpu_models, select_model};
use crate::qemu::RecognisedFlags;
use crate::reconcile::{
    compare, effective_option_flags, expected_flags, lack_flags, unwarned_lack_flags,
};
use crate::report::FlagReport;
use crate::session::{guest_cpu_flags, GuestSession};

/// QEMU option that makes it warn about flags the host lacks.
pub const CHECK_OPTION: &str = "check";

/// What the guest was booted with and what to tolerate.
#[derive(Debug, Clone)]
pub struct CheckPlan {
    pub guest_model: Option<String>,
    pub extra_flags: ExtraFlags,
    pub extra_flags_raw: String,
    pub reg_list: Vec<String>,
    pub out_flags: FlagSet,
    pub option_flags: FlagSet,
    pub smp: u32,
}

impl Default for CheckPlan {
    fn default() -> Self {
        Self {
            guest_model: None,
            extra_flags: ExtraFlags::default(),
            extra_flags_raw: String::new(),
            reg_list: vec!["feature_edx".to_string()],
            out_flags: FlagSet::new(),
            option_flags: FlagSet::new(),
            smp: 1,
        }
    }
}

impl CheckPlan {
    pub fn with_extra_flags(mut self, boot_flags: &str) -> Self {
        self.extra_flags = ExtraFlags::parse(boot_flags);
        self.extra_flags_raw = boot_flags.trim().to_string();
        self
    }
}

/// Expected flags for the selected model, before looking at the guest.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub qemu_model: String,
    pub model_flags: FlagSet,
    pub expected: FlagSet,
    pub lack: FlagSet,
}

pub struct FlagCheck<'a> {
    plan: &'a CheckPlan,
    dump: &'a ModelDump,
    host: &'a HostCpu,
}

impl<'a> FlagCheck<'a> {
    pub fn new(plan: &'a CheckPlan, dump: &'a ModelDump, host: &'a HostCpu) -> Self {
        Self { plan, dump, host }
    }

    pub fn expectation(&self) -> Result<Expectation> {
        let host_models = host_cpu_models(self.host);
        let qemu_model = select_model(
            self.plan.guest_model.as_deref(),
            &host_models,
            self.host.vendor.as_deref(),
        )?;

        let _span = info_span!("model_flags", model = %qemu_model).entered();
        info!("Get model {} support flags", qemu_model);
        let model_flags = match self.dump.find(&qemu_model) {
            Some(model) => model.support_flags(&self.plan.reg_list),
            None => {
                warn!("model {} not found in dump, expecting only added flags", qemu_model);
                FlagSet::new()
            }
        };

        let expected = expected_flags(
            &model_flags,
            &self.plan.extra_flags,
            &self.host.flags,
            &self.plan.out_flags,
        );
        let lack = lack_flags(&expected, &self.plan.extra_flags, &self.host.flags);

        Ok(Expectation {
            qemu_model,
            model_flags,
            expected,
            lack,
        })
    }

    /// Runs the whole check. A mismatch is reported through
    /// [`FlagReport::passed`], not as an error.
    pub fn run(
        &self,
        session: &dyn GuestSession,
        recognised: &dyn RecognisedFlags,
        qemu_output: Option<&str>,
    ) -> Result<FlagReport> {
        let guest_model = self.plan.guest_model.as_deref().unwrap_or("host");
        let _span = info_span!("flag_check", guest_model).entered();
        info!(
            "Boot guest with -cpu {},{}",
            guest_model, self.plan.extra_flags_raw
        );

        for (key, value) in self.plan.extra_flags.properties() {
            debug!("ignoring CPU property {}={}", key, value);
        }

        let expectation = self.expectation()?;

        info!("Get guest flags");
        let guest = guest_cpu_flags(session)?;

        info!("Get expected flag list");
        let options = effective_option_flags(&self.plan.option_flags, self.plan.smp);

        let unwarned = if self.plan.extra_flags.has_option(CHECK_OPTION) {
            info!("Check lack flag in host");
            let output = qemu_output.ok_or_else(|| {
                Error::Command(
                    "lack flag check requested but no QEMU output was provided".to_string(),
                )
            })?;
            unwarned_lack_flags(&expectation.lack, output)
        } else {
            FlagSet::new()
        };

        info!("Compare guest flags with expected flags");
        let comparison = compare(
            &expectation.expected,
            &guest,
            &recognised.recognised_flags()?,
            &options,
        );

        let mut report = FlagReport {
            guest_model: self.plan.guest_model.clone(),
            qemu_model: expectation.qemu_model,
            expected: expectation.expected,
            guest,
            missing: comparison.missing,
            unexpected: comparison.unexpected,
            lack: expectation.lack,
            unwarned,
            passed: false,
        };
        report.update_status();
        if report.passed {
            info!("guest flags match model {}", report.qemu_model);
        } else {
            warn!(
                missing = %report.missing,
                unexpected = %report.unexpected,
                unwarned = %report.unwarned,
                "guest flags do not match"
            );
        }
        Ok(report)
    }
}
