use crate::api::accounting::{DailyView, LineInput, MovementDay, MovementsView, SaveDaily};
use crate::api::commission::{CommissionOverview, SaveMonth, UpdateSettings};
use crate::api::commitments::{CommitmentAction, CommitmentForm, CommitmentRef, CommitmentUpdate};
use crate::api::employee::{CreateEmployee, DocumentStatus, EmployeeListResponse, EmployeeView};
use crate::api::permissions::{
    NewUser, PermissionLabel, PermissionsPage, UserAction, UserPermissions, UserRef, UserUpdate,
};
use crate::api::records::{CreateRecord, RecordView};
use crate::api::tasks::{CreateTask, TaskBoard};
use crate::auth::handlers::{HomeView, PageLink};
use crate::model::alert::{Alert, AlertSource};
use crate::model::branch::Branch;
use crate::model::commission::{CommissionBreakdown, CommissionSettings, MonthlyCommission};
use crate::model::commitment::FinancialCommitment;
use crate::model::daily::{DailyHeader, DailyTotals, LineItem, LineItems};
use crate::model::employee::{Employee, EmployeeDocument};
use crate::model::permission::PermKey;
use crate::model::record::Record;
use crate::model::task::Task;
use crate::models::{LoginReqDto, SessionInfo};
use crate::utils::expiry::ExpiryStatus;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Branch Ledger API",
        version = "1.0.0",
        description = r#"
## Branch record-keeping and accounting

Back office for three branches (ES1, ES2, ES3).

### Key Features
- **Daily accounting**: cash ledger per branch and day, with reconciliation
- **Monthly commission**: sales commission with a settings snapshot per month
- **Financial commitments**: each one owns a follow-up task
- **Records and employees**: document numbers and expiry tracking
- **Tasks**: manual tasks plus expiry alerts
- **Permissions**: per-user page keys, managed by the master account

### Security
Every endpoint except `/login` needs the `session` cookie set by `/login`.

Saved rows are mirrored to a spreadsheet when credentials are configured.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::logout,
        crate::auth::handlers::home,

        crate::api::accounting::get_daily,
        crate::api::accounting::save_daily,
        crate::api::accounting::movements,

        crate::api::commission::get_settings,
        crate::api::commission::update_settings,
        crate::api::commission::list_months,
        crate::api::commission::save_month,
        crate::api::commission::delete_month,

        crate::api::commitments::list_commitments,
        crate::api::commitments::commitment_action,

        crate::api::records::list_records,
        crate::api::records::create_record,
        crate::api::records::update_record,
        crate::api::records::delete_record,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::tasks::list_tasks,
        crate::api::tasks::create_task,
        crate::api::tasks::delete_task,

        crate::api::permissions::list_permissions,
        crate::api::permissions::user_action
    ),
    components(
        schemas(
            LoginReqDto,
            SessionInfo,
            HomeView,
            PageLink,
            PermKey,
            Branch,
            LineInput,
            SaveDaily,
            DailyView,
            DailyHeader,
            LineItem,
            LineItems,
            DailyTotals,
            MovementDay,
            MovementsView,
            UpdateSettings,
            SaveMonth,
            CommissionOverview,
            CommissionSettings,
            CommissionBreakdown,
            MonthlyCommission,
            CommitmentAction,
            CommitmentForm,
            CommitmentUpdate,
            CommitmentRef,
            FinancialCommitment,
            CreateRecord,
            RecordView,
            Record,
            ExpiryStatus,
            CreateEmployee,
            DocumentStatus,
            EmployeeView,
            Employee,
            EmployeeDocument,
            EmployeeListResponse,
            CreateTask,
            TaskBoard,
            Task,
            Alert,
            AlertSource,
            PermissionLabel,
            UserPermissions,
            PermissionsPage,
            UserAction,
            NewUser,
            UserUpdate,
            UserRef
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign in, sign out and landing page"),
        (name = "Accounting", description = "Daily cash ledger per branch"),
        (name = "Commission", description = "Monthly sales commission"),
        (name = "Commitments", description = "Financial commitments and their tasks"),
        (name = "Records", description = "Branch records with expiry tracking"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Tasks", description = "Manual tasks and expiry alerts"),
        (name = "Permissions", description = "User and permission administration"),
    )
)]
pub struct ApiDoc;

/// Registers the `session` cookie as the security scheme the paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session"))),
            );
        }
    }
}
