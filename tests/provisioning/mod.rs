mod provisioning_task;
